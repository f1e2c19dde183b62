use std::sync::Arc;

use policy_types::{Assertion, PolicyType, PolicyValidatorResult, RemedialAction};
use tracing::warn;

use crate::messages;
use crate::registry::{AssertionValidator, PathScope};

/// Include targets must exist and be include fragments.
#[derive(Debug, Clone, Copy, Default)]
pub struct IncludeValidator;

impl AssertionValidator for IncludeValidator {
    fn name(&self) -> &'static str {
        "include"
    }

    fn validate(
        &self,
        assertion: &Arc<Assertion>,
        scope: &PathScope<'_>,
        result: &mut PolicyValidatorResult,
    ) {
        let Some(guid) = assertion.included_guid() else {
            return;
        };
        match scope.includes.resolve(guid) {
            Ok(None) => result.add_error(
                scope
                    .diagnostic(assertion, messages::include_dangling(guid))
                    .with_remedy(RemedialAction::RemoveInclude),
            ),
            Ok(Some(fragment)) if fragment.policy_type() != PolicyType::IncludeFragment => {
                result.add_error(
                    scope
                        .diagnostic(assertion, messages::include_not_fragment(fragment.name()))
                        .with_remedy(RemedialAction::RemoveInclude),
                )
            }
            Ok(Some(_)) => {}
            Err(e) => warn!(%guid, error = %e, "fragment lookup failed, skipping include check"),
        }
    }
}
