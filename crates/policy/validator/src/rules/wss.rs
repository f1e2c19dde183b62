use std::sync::Arc;

use policy_types::{Assertion, AssertionKind, PolicyValidatorResult};
use tracing::warn;

use crate::messages;
use crate::registry::{AssertionValidator, PathScope};

/// Request-side assertions that make the client sign or encrypt with WSS 1.1.
fn secures_request(a: &Assertion) -> bool {
    a.is_request()
        && matches!(
            a.kind(),
            AssertionKind::RequireWssX509Cert { .. }
                | AssertionKind::RequireWssSignedElement { .. }
                | AssertionKind::SecureConversation
                | AssertionKind::EncryptedUsernameToken
                | AssertionKind::RequireWssEncryptedElement { .. }
                | AssertionKind::RequestWssKerberos
                | AssertionKind::RequireWssSaml { .. }
                | AssertionKind::RequireWssTimestamp {
                    signature_required: true
                }
        )
}

/// Response-side decorations that sign or encrypt.
fn secures_response(a: &Assertion) -> bool {
    a.is_response()
        && matches!(
            a.kind(),
            AssertionKind::WssSignElement { .. }
                | AssertionKind::WssEncryptElement { .. }
                | AssertionKind::AddWssSecurityToken { .. }
                | AssertionKind::AddWssTimestamp {
                    signature_required: true
                }
        )
}

/// A WSS 1.1 request only makes sense with message security around routing.
#[derive(Debug, Clone, Copy, Default)]
pub struct WssVersionValidator;

impl AssertionValidator for WssVersionValidator {
    fn name(&self) -> &'static str {
        "wss_version"
    }

    fn validate(
        &self,
        assertion: &Arc<Assertion>,
        scope: &PathScope<'_>,
        result: &mut PolicyValidatorResult,
    ) {
        let effective: Vec<&Arc<Assertion>> = scope
            .path
            .iter()
            .filter(|a| a.is_enabled() && !a.is_comment())
            .collect();
        let Some(routing) = effective.iter().position(|a| a.is_routing()) else {
            return;
        };

        let before = effective[..routing].iter().any(|a| secures_request(a));
        let after = effective[routing + 1..].iter().any(|a| secures_response(a));

        let message = match (before, after) {
            (false, false) => messages::WSS_VERSION_INSUFFICIENT,
            (false, true) => messages::WSS_VERSION_NOTHING_BEFORE_ROUTE,
            (true, false) => messages::WSS_VERSION_NOTHING_AFTER_ROUTE,
            (true, true) => return,
        };
        result.add_warning(scope.diagnostic(assertion, message));
    }
}

/// Attachment checks need MIME multipart bindings in the WSDL.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwaValidator;

impl AssertionValidator for SwaValidator {
    fn name(&self) -> &'static str {
        "swa"
    }

    fn validate(
        &self,
        assertion: &Arc<Assertion>,
        scope: &PathScope<'_>,
        result: &mut PolicyValidatorResult,
    ) {
        if !scope.context.soap {
            return;
        }
        let Some(wsdl) = &scope.context.wsdl else {
            return;
        };
        match wsdl.has_mime_multipart() {
            Ok(true) => {}
            Ok(false) => {
                result.add_warning(scope.diagnostic(assertion, messages::SWA_NO_MULTIPART))
            }
            Err(e) => warn!(
                assertion = %assertion,
                error = %e,
                "WSDL unreadable, skipping attachment check"
            ),
        }
    }
}
