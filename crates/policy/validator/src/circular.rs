//! Circular include detection.
//!
//! Depth-first walk of the tree, disabled nodes included, following includes
//! into their fragments. A policy stays in the visited map only while its
//! subtree is being walked, so one fragment may be included from several
//! sibling branches.

use std::collections::HashMap;
use std::sync::Arc;

use policy_types::{Assertion, Diagnostic, PolicyGoid, PolicyGuid, PolicyHeader, RemedialAction};
use tracing::debug;

use crate::messages;
use crate::resolver::IncludeResolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PolicyKey {
    Guid(PolicyGuid),
    Goid(PolicyGoid),
}

fn keys(header: &PolicyHeader) -> Vec<PolicyKey> {
    let mut keys = vec![PolicyKey::Guid(header.guid)];
    if header.goid != PolicyGoid::DEFAULT {
        keys.push(PolicyKey::Goid(header.goid));
    }
    keys
}

struct CircularIncludeDetector<'a> {
    includes: &'a IncludeResolver<'a>,
    visited: HashMap<PolicyKey, String>,
    errors: Vec<Diagnostic>,
}

impl CircularIncludeDetector<'_> {
    fn walk(&mut self, assertion: &Arc<Assertion>) {
        let Some(guid) = assertion.included_guid() else {
            for child in assertion.children() {
                self.walk(child);
            }
            return;
        };

        if let Some(name) = self.visited.get(&PolicyKey::Guid(guid)).cloned() {
            self.report(assertion, guid, &name);
            return;
        }

        let fragment = match self.includes.resolve(guid) {
            Ok(Some(fragment)) => fragment,
            Ok(None) => return,
            Err(e) => {
                debug!(%guid, error = %e, "skipping unresolvable include");
                return;
            }
        };

        let fragment_keys = keys(fragment.header());
        let cycle = fragment_keys
            .iter()
            .find_map(|key| self.visited.get(key))
            .cloned();
        if let Some(name) = cycle {
            self.report(assertion, guid, &name);
            return;
        }

        for key in &fragment_keys {
            self.visited.insert(*key, fragment.name().to_string());
        }
        self.walk(fragment.root());
        for key in &fragment_keys {
            self.visited.remove(key);
        }
    }

    fn report(&mut self, include: &Arc<Assertion>, guid: PolicyGuid, visited_name: &str) {
        self.errors.push(
            Diagnostic::new(include.clone(), messages::circular_include(guid, visited_name))
                .with_remedy(RemedialAction::RemoveInclude),
        );
    }
}

/// Errors for every include that leads back into a policy already being
/// walked, starting from the policy described by `root_header`.
pub fn detect(
    includes: &IncludeResolver<'_>,
    root_header: &PolicyHeader,
    root: &Arc<Assertion>,
) -> Vec<Diagnostic> {
    let visited = keys(root_header)
        .into_iter()
        .map(|key| (key, root_header.name.clone()))
        .collect();
    let mut detector = CircularIncludeDetector {
        includes,
        visited,
        errors: Vec::new(),
    };
    detector.walk(root);
    detector.errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockFragmentLookup;
    use policy_types::{AssertionKind, Policy, PolicyType};

    fn fragment(guid: PolicyGuid, name: &str, root: Arc<Assertion>) -> Policy {
        Policy::new(PolicyHeader::new(guid, name, PolicyType::IncludeFragment), root)
    }

    #[test]
    fn self_reference_through_fragment() {
        let a = PolicyGuid::generate();
        let b = PolicyGuid::generate();
        let back_to_a = Assertion::include(a, "A");
        let lookup = MockFragmentLookup::new().with_policy(fragment(
            b,
            "B",
            Assertion::all(vec![back_to_a.clone()]).unwrap(),
        ));
        let includes = IncludeResolver::new(&lookup);
        let root = Assertion::all(vec![Assertion::include(b, "B")]).unwrap();

        let header = PolicyHeader::new(a, "A", PolicyType::PrivateService);
        let errors = detect(&includes, &header, &root);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].concerns(&back_to_a));
        assert_eq!(errors[0].message, messages::circular_include(a, "A"));
    }

    #[test]
    fn sibling_reuse_is_not_a_cycle() {
        let shared = PolicyGuid::generate();
        let lookup = MockFragmentLookup::new().with_policy(fragment(
            shared,
            "shared",
            Assertion::all(vec![Assertion::leaf(AssertionKind::True)]).unwrap(),
        ));
        let includes = IncludeResolver::new(&lookup);
        let root = Assertion::all(vec![
            Assertion::include(shared, "shared"),
            Assertion::one_or_more(vec![Assertion::include(shared, "shared")]).unwrap(),
        ])
        .unwrap();
        let header = PolicyHeader::unsaved("service", PolicyType::PrivateService);
        assert!(detect(&includes, &header, &root).is_empty());
    }

    #[test]
    fn disabled_includes_are_walked() {
        let a = PolicyGuid::generate();
        let include = Assertion::builder(AssertionKind::Include {
            guid: a,
            name: "A".into(),
        })
        .disabled()
        .build()
        .unwrap();
        let lookup = MockFragmentLookup::new().with_policy(fragment(
            a,
            "A",
            Assertion::all(vec![Assertion::include(a, "A")]).unwrap(),
        ));
        let includes = IncludeResolver::new(&lookup);
        let root = Assertion::all(vec![include]).unwrap();
        let header = PolicyHeader::unsaved("service", PolicyType::PrivateService);
        assert_eq!(detect(&includes, &header, &root).len(), 1);
    }

    #[test]
    fn goid_identifies_a_policy_too() {
        let lookup_guid = PolicyGuid::generate();
        let policy = Policy::new(
            PolicyHeader::new(lookup_guid, "renamed", PolicyType::IncludeFragment)
                .with_goid(PolicyGoid(42)),
            Assertion::all(vec![Assertion::include(lookup_guid, "renamed")]).unwrap(),
        );
        let lookup = MockFragmentLookup::new().with_policy(policy);
        let includes = IncludeResolver::new(&lookup);
        let root_header =
            PolicyHeader::new(PolicyGuid::generate(), "root", PolicyType::PrivateService)
                .with_goid(PolicyGoid(42));
        let root = Assertion::all(vec![Assertion::include(lookup_guid, "renamed")]).unwrap();
        let errors = detect(&includes, &root_header, &root);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, messages::circular_include(lookup_guid, "root"));
    }

    #[test]
    fn unresolvable_includes_are_skipped() {
        let missing = PolicyGuid::generate();
        let failing = PolicyGuid::generate();
        let lookup = MockFragmentLookup::new().failing_for(failing);
        let includes = IncludeResolver::new(&lookup);
        let root = Assertion::all(vec![
            Assertion::include(missing, "missing"),
            Assertion::include(failing, "failing"),
        ])
        .unwrap();
        let header = PolicyHeader::unsaved("service", PolicyType::PrivateService);
        assert!(detect(&includes, &header, &root).is_empty());
    }
}
