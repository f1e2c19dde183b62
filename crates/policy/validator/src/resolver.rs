//! Call-scoped include dereferencing.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use policy_types::{Assertion, Policy, PolicyGuid};
use tracing::trace;

use crate::error::LookupError;
use crate::traits::PolicyFragmentLookup;

/// Resolves include assertions to their fragments for one validation call.
///
/// Successful lookups are memoized for the lifetime of the resolver. The
/// resolver is neither `Send` nor `Sync`; each top-level call creates its own
/// and drops it on every exit path.
pub struct IncludeResolver<'a> {
    lookup: &'a dyn PolicyFragmentLookup,
    resolved: RefCell<HashMap<PolicyGuid, Option<Arc<Policy>>>>,
}

impl<'a> IncludeResolver<'a> {
    pub fn new(lookup: &'a dyn PolicyFragmentLookup) -> Self {
        Self {
            lookup,
            resolved: RefCell::new(HashMap::new()),
        }
    }

    /// The fragment with `guid`. Lookup failures are not memoized.
    pub fn resolve(&self, guid: PolicyGuid) -> Result<Option<Arc<Policy>>, LookupError> {
        if let Some(hit) = self.resolved.borrow().get(&guid) {
            return Ok(hit.clone());
        }
        let found = self.lookup.find_by_guid(guid)?;
        self.resolved.borrow_mut().insert(guid, found.clone());
        Ok(found)
    }

    /// The fragment referenced by `include`; `None` for other assertions.
    pub fn resolve_include(&self, include: &Assertion) -> Result<Option<Arc<Policy>>, LookupError> {
        match include.included_guid() {
            Some(guid) => self.resolve(guid),
            None => Ok(None),
        }
    }

    pub fn resolved_count(&self) -> usize {
        self.resolved.borrow().len()
    }
}

impl Drop for IncludeResolver<'_> {
    fn drop(&mut self) {
        trace!(fragments = self.resolved.get_mut().len(), "include resolver released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockFragmentLookup;
    use policy_types::{PolicyHeader, PolicyType};

    #[test]
    fn memoizes_successful_lookups() {
        let guid = PolicyGuid::generate();
        let fragment = Policy::new(
            PolicyHeader::new(guid, "frag", PolicyType::IncludeFragment),
            Assertion::all(vec![]).unwrap(),
        );
        let lookup = MockFragmentLookup::new().with_policy(fragment);
        let resolver = IncludeResolver::new(&lookup);

        assert!(resolver.resolve(guid).unwrap().is_some());
        assert!(resolver.resolve(guid).unwrap().is_some());
        assert_eq!(lookup.lookup_count(), 1);
        assert_eq!(resolver.resolved_count(), 1);
    }

    #[test]
    fn missing_fragment_is_none() {
        let lookup = MockFragmentLookup::new();
        let resolver = IncludeResolver::new(&lookup);
        let include = Assertion::include(PolicyGuid::generate(), "gone");
        assert!(resolver.resolve_include(&include).unwrap().is_none());
    }

    #[test]
    fn failures_are_not_memoized() {
        let guid = PolicyGuid::generate();
        let lookup = MockFragmentLookup::new().failing_for(guid);
        let resolver = IncludeResolver::new(&lookup);
        assert!(resolver.resolve(guid).is_err());
        assert!(resolver.resolve(guid).is_err());
        assert_eq!(lookup.lookup_count(), 2);
    }
}
