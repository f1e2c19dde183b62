use std::sync::Arc;

use policy_types::{
    Assertion, AssertionKind, PolicyValidatorResult, ProofOfPossession, RemedialAction,
};

use crate::messages;
use crate::registry::{AssertionValidator, PathScope};

/// Identity assertions name a provider and a principal.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityValidator;

impl AssertionValidator for IdentityValidator {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn validate(
        &self,
        assertion: &Arc<Assertion>,
        scope: &PathScope<'_>,
        result: &mut PolicyValidatorResult,
    ) {
        let (provider, principal) = match assertion.kind() {
            AssertionKind::SpecificUser { provider, login } => {
                (provider, Some((login, messages::IDENTITY_NO_LOGIN)))
            }
            AssertionKind::MemberOfGroup { provider, group } => {
                (provider, Some((group, messages::IDENTITY_NO_GROUP)))
            }
            AssertionKind::Authentication { provider } => (provider, None),
            _ => return,
        };

        if provider.trim().is_empty() {
            result.add_error(scope.diagnostic(assertion, messages::IDENTITY_NO_PROVIDER));
        }
        if let Some((value, message)) = principal {
            if value.trim().is_empty() {
                result.add_error(scope.diagnostic(assertion, message));
            }
        }
    }
}

/// Sender-vouches SAML needs the sender authenticated by signature or
/// client certificate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SamlValidator;

impl AssertionValidator for SamlValidator {
    fn name(&self) -> &'static str {
        "saml"
    }

    fn validate(
        &self,
        assertion: &Arc<Assertion>,
        scope: &PathScope<'_>,
        result: &mut PolicyValidatorResult,
    ) {
        let AssertionKind::RequireWssSaml {
            confirmation: ProofOfPossession::SenderVouches,
        } = assertion.kind()
        else {
            return;
        };

        let actor = assertion.actor();
        let vouched = scope.path.predecessors(assertion).any(|a| match a.kind() {
            AssertionKind::RequireWssX509Cert { .. } | AssertionKind::SecureConversation => {
                a.actor() == actor && a.target() == assertion.target()
            }
            AssertionKind::Ssl {
                require_client_cert: true,
            } => actor.is_local(),
            _ => false,
        });
        if !vouched {
            result.add_warning(
                scope
                    .diagnostic(assertion, messages::SAML_SENDER_VOUCHES_UNSIGNED)
                    .with_remedy(RemedialAction::AddCredentialSource),
            );
        }
    }
}

/// A non-default signing key must name its alias.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrivateKeyValidator;

impl AssertionValidator for PrivateKeyValidator {
    fn name(&self) -> &'static str {
        "private_key"
    }

    fn validate(
        &self,
        assertion: &Arc<Assertion>,
        scope: &PathScope<'_>,
        result: &mut PolicyValidatorResult,
    ) {
        let Some(key) = assertion.private_key() else {
            return;
        };
        let has_alias = key.alias.as_deref().is_some_and(|a| !a.trim().is_empty());
        if !key.uses_default_key && !has_alias {
            result.add_error(scope.diagnostic(assertion, messages::PRIVATE_KEY_NO_ALIAS));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockFragmentLookup;
    use crate::rules::testing::{run_alone, run_on};
    use policy_types::{PolicyValidationContext, PrivateKeyRef, RecipientContext};

    #[test]
    fn identity_fields_must_be_set() {
        let user = Assertion::leaf(AssertionKind::SpecificUser {
            provider: "internal".into(),
            login: "alice".into(),
        });
        assert!(run_alone(&IdentityValidator, &user).is_empty());

        let group = Assertion::leaf(AssertionKind::MemberOfGroup {
            provider: "".into(),
            group: " ".into(),
        });
        let messages: Vec<_> = run_alone(&IdentityValidator, &group)
            .errors()
            .iter()
            .map(|d| d.message.clone())
            .collect();
        assert_eq!(messages, vec![messages::IDENTITY_NO_PROVIDER, messages::IDENTITY_NO_GROUP]);
    }

    fn sender_vouches() -> Arc<Assertion> {
        Assertion::leaf(AssertionKind::RequireWssSaml {
            confirmation: ProofOfPossession::SenderVouches,
        })
    }

    #[test]
    fn sender_vouches_needs_prior_signature() {
        let saml = sender_vouches();
        let result = run_alone(&SamlValidator, &saml);
        assert_eq!(result.warnings().len(), 1);

        let ssl = Assertion::leaf(AssertionKind::Ssl {
            require_client_cert: true,
        });
        let result = run_on(
            &SamlValidator,
            vec![ssl, saml.clone()],
            &saml,
            &PolicyValidationContext::soap_service(),
            &MockFragmentLookup::new(),
        );
        assert!(result.is_empty());
    }

    #[test]
    fn signature_for_other_actor_does_not_vouch() {
        let cert = Assertion::builder(AssertionKind::RequireWssX509Cert {
            allow_multiple_signatures: false,
        })
        .recipient(RecipientContext::for_actor("urn:partner"))
        .build()
        .unwrap();
        let saml = sender_vouches();
        let result = run_on(
            &SamlValidator,
            vec![cert, saml.clone()],
            &saml,
            &PolicyValidationContext::soap_service(),
            &MockFragmentLookup::new(),
        );
        assert_eq!(result.warnings().len(), 1);
    }

    #[test]
    fn holder_of_key_is_not_checked() {
        let saml = Assertion::leaf(AssertionKind::RequireWssSaml {
            confirmation: ProofOfPossession::HolderOfKey,
        });
        assert!(run_alone(&SamlValidator, &saml).is_empty());
    }

    #[test]
    fn private_key_needs_alias() {
        let token = AssertionKind::AddWssSecurityToken {
            token_type: Default::default(),
            include_password: false,
            use_last_gathered_credentials: false,
            encrypt: false,
        };
        let default_key = Assertion::leaf(token.clone());
        assert!(run_alone(&PrivateKeyValidator, &default_key).is_empty());

        let aliased = Assertion::builder(token.clone())
            .private_key(PrivateKeyRef::alias("main", "signer"))
            .build()
            .unwrap();
        assert!(run_alone(&PrivateKeyValidator, &aliased).is_empty());

        let missing = Assertion::builder(token)
            .private_key(PrivateKeyRef {
                uses_default_key: false,
                keystore: Some("main".into()),
                alias: None,
            })
            .build()
            .unwrap();
        let result = run_alone(&PrivateKeyValidator, &missing);
        assert_eq!(result.errors()[0].message, messages::PRIVATE_KEY_NO_ALIAS);
    }
}
