use std::sync::Arc;

use policy_types::{Assertion, AssertionMetadata, AssertionPath, Policy, PolicyGuid};

use crate::error::{FragmentError, LookupError, PathBuildError};
use crate::resolver::IncludeResolver;

/// Policy store lookup used to resolve include assertions.
pub trait PolicyFragmentLookup: Send + Sync {
    /// The policy with `guid`, or `None` when no such policy exists.
    fn find_by_guid(&self, guid: PolicyGuid) -> Result<Option<Arc<Policy>>, LookupError>;
}

/// License check consulted once per assertion visited.
pub trait LicenseOracle: Send + Sync {
    fn is_assertion_enabled(&self, meta: &AssertionMetadata) -> bool;
}

/// Expands a tree into its linear, OR-resolved paths.
///
/// Paths preserve left-to-right sibling order and omit disabled nodes,
/// comments and composite containers. Two nodes stay in a path even though
/// they contribute no behavior of their own:
///
/// - a composite with no enabled, non-comment child appears as a leaf, so the
///   empty-composite warning can be raised against it;
/// - an include appears as a marker directly before its fragment's content,
///   which is spliced in place. An include that cannot be resolved, or that
///   re-enters a fragment already being expanded, appears alone.
pub trait PathBuilder: Send + Sync {
    fn generate(
        &self,
        root: &Arc<Assertion>,
        includes: &IncludeResolver<'_>,
    ) -> Result<Vec<AssertionPath>, PathBuildError>;

    /// Include problems that must stop validation before paths are built.
    fn preflight_includes(
        &self,
        root: &Arc<Assertion>,
        includes: &IncludeResolver<'_>,
    ) -> Vec<FragmentError>;
}
