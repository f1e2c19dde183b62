//! Test doubles for the validator's collaborators.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use policy_types::{
    Assertion, AssertionKind, AssertionMetadata, AssertionPath, BindingOperation, PathId, Policy,
    PolicyGuid, WsdlError, WsdlInspector,
};

use crate::error::{FragmentError, LookupError, PathBuildError};
use crate::resolver::IncludeResolver;
use crate::traits::{LicenseOracle, PathBuilder, PolicyFragmentLookup};

/// In-memory policy store.
#[derive(Default)]
pub struct MockFragmentLookup {
    policies: HashMap<PolicyGuid, Arc<Policy>>,
    failing: HashSet<PolicyGuid>,
    lookups: AtomicUsize,
}

impl MockFragmentLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policies.insert(policy.guid(), Arc::new(policy));
        self
    }

    /// Lookups of `guid` fail as if the store were unavailable.
    pub fn failing_for(mut self, guid: PolicyGuid) -> Self {
        self.failing.insert(guid);
        self
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl PolicyFragmentLookup for MockFragmentLookup {
    fn find_by_guid(&self, guid: PolicyGuid) -> Result<Option<Arc<Policy>>, LookupError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&guid) {
            return Err(LookupError::Unavailable(format!("lookup of {guid} failed")));
        }
        Ok(self.policies.get(&guid).cloned())
    }
}

/// License oracle with an explicit deny list, matched against the kind name
/// and the feature set name.
#[derive(Default)]
pub struct MockLicenseOracle {
    denied: HashSet<String>,
    deny_all: bool,
    calls: AtomicUsize,
}

impl MockLicenseOracle {
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn deny_all() -> Self {
        Self {
            deny_all: true,
            ..Self::default()
        }
    }

    pub fn denying(mut self, kind: impl Into<String>) -> Self {
        self.denied.insert(kind.into());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LicenseOracle for MockLicenseOracle {
    fn is_assertion_enabled(&self, meta: &AssertionMetadata) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        !self.deny_all
            && !self.denied.contains(&*meta.name)
            && !self.denied.contains(&*meta.feature_set_name())
    }
}

/// Path builder that expands `OneOrMore` into alternatives and splices
/// included fragments in place.
///
/// Disabled nodes and comments are dropped and non-empty composites are
/// flattened. A composite with no enabled children stays in the path as a
/// leaf, and each include stays as a marker ahead of its fragment's content.
pub struct MockPathBuilder {
    max_paths: usize,
}

impl MockPathBuilder {
    pub fn new() -> Self {
        Self { max_paths: 1024 }
    }

    pub fn with_max_paths(mut self, max_paths: usize) -> Self {
        self.max_paths = max_paths;
        self
    }

    fn expand(
        &self,
        node: &Arc<Assertion>,
        includes: &IncludeResolver<'_>,
        entered: &mut Vec<PolicyGuid>,
    ) -> Result<Vec<Vec<Arc<Assertion>>>, PathBuildError> {
        if !node.is_enabled() || node.is_comment() {
            return Ok(vec![Vec::new()]);
        }
        if node.is_composite() && !node.has_effective_children() {
            return Ok(vec![vec![node.clone()]]);
        }

        match node.kind() {
            AssertionKind::All => {
                let mut paths = vec![Vec::new()];
                for child in node.children() {
                    let tails = self.expand(child, includes, entered)?;
                    paths = paths
                        .iter()
                        .flat_map(|head| {
                            tails.iter().map(move |tail| {
                                let mut path = head.clone();
                                path.extend(tail.iter().cloned());
                                path
                            })
                        })
                        .collect();
                    self.check_limit(paths.len())?;
                }
                Ok(paths)
            }
            AssertionKind::OneOrMore => {
                let mut paths = Vec::new();
                for child in node.children() {
                    if child.is_enabled() && !child.is_comment() {
                        paths.extend(self.expand(child, includes, entered)?);
                        self.check_limit(paths.len())?;
                    }
                }
                Ok(paths)
            }
            AssertionKind::Include { guid, .. } => {
                if entered.contains(guid) {
                    return Ok(vec![vec![node.clone()]]);
                }
                let Some(fragment) = includes.resolve(*guid)? else {
                    return Ok(vec![vec![node.clone()]]);
                };
                entered.push(*guid);
                let expanded = self.expand(fragment.root(), includes, entered);
                entered.pop();
                Ok(expanded?
                    .into_iter()
                    .map(|tail| {
                        let mut path = vec![node.clone()];
                        path.extend(tail);
                        path
                    })
                    .collect())
            }
            _ => Ok(vec![vec![node.clone()]]),
        }
    }

    fn check_limit(&self, paths: usize) -> Result<(), PathBuildError> {
        if paths > self.max_paths {
            Err(PathBuildError::TooManyPaths {
                limit: self.max_paths,
            })
        } else {
            Ok(())
        }
    }

    fn preflight(
        node: &Arc<Assertion>,
        includes: &IncludeResolver<'_>,
        entered: &mut Vec<PolicyGuid>,
        errors: &mut Vec<FragmentError>,
    ) {
        if !node.is_enabled() {
            return;
        }
        let Some(guid) = node.included_guid() else {
            for child in node.children() {
                Self::preflight(child, includes, entered, errors);
            }
            return;
        };
        if entered.contains(&guid) {
            return;
        }
        match includes.resolve(guid) {
            Ok(Some(fragment)) => {
                entered.push(guid);
                Self::preflight(fragment.root(), includes, entered, errors);
                entered.pop();
            }
            Ok(None) => {}
            Err(e) => errors.push(FragmentError {
                include: node.clone(),
                guid,
                reason: e.to_string(),
            }),
        }
    }
}

impl Default for MockPathBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PathBuilder for MockPathBuilder {
    fn generate(
        &self,
        root: &Arc<Assertion>,
        includes: &IncludeResolver<'_>,
    ) -> Result<Vec<AssertionPath>, PathBuildError> {
        let mut entered = Vec::new();
        let expanded = self.expand(root, includes, &mut entered)?;
        Ok(expanded
            .into_iter()
            .enumerate()
            .map(|(i, assertions)| AssertionPath::new(PathId(i), assertions))
            .collect())
    }

    fn preflight_includes(
        &self,
        root: &Arc<Assertion>,
        includes: &IncludeResolver<'_>,
    ) -> Vec<FragmentError> {
        let mut errors = Vec::new();
        Self::preflight(root, includes, &mut Vec::new(), &mut errors);
        errors
    }
}

/// Fixed WSDL description.
#[derive(Default)]
pub struct MockWsdl {
    operations: Vec<BindingOperation>,
    mime_multipart: bool,
    failure: Option<WsdlError>,
}

impl MockWsdl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_operation(mut self, operation: BindingOperation) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn with_mime_multipart(mut self) -> Self {
        self.mime_multipart = true;
        self
    }

    /// Every query fails with `error`.
    pub fn failing(mut self, error: WsdlError) -> Self {
        self.failure = Some(error);
        self
    }
}

impl WsdlInspector for MockWsdl {
    fn binding_operations(&self) -> Result<Vec<BindingOperation>, WsdlError> {
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(self.operations.clone()),
        }
    }

    fn has_mime_multipart(&self) -> Result<bool, WsdlError> {
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(self.mime_multipart),
        }
    }
}
