//! Path validation engine.
//!
//! Walks one [`AssertionPath`] in order. For each enabled, non-comment
//! assertion:
//!
//! 1. cancellation check
//! 2. the registry behavior for its kind
//! 3. license and permitted-kind checks
//! 4. ordering preconditions, against the state before this assertion
//! 5. category bookkeeping (credential sources, access control, routing, ...)
//! 6. the kind is marked seen for its target
//!
//! Deferred behavior checks and, for service policies, whole-path summary
//! warnings run after the walk.

use std::sync::{Arc, LazyLock};

use policy_types::{
    Assertion, AssertionKind, AssertionPath, Capability, Diagnostic, IdentityTargetKind,
    MessageTarget, PolicyType, PolicyValidationContext, PolicyValidatorResult, RemedialAction,
    SecurityTokenType, ValidatorFlag,
};
use tracing::{debug, trace, warn};

use crate::cancel::CancelHandle;
use crate::config::ValidatorConfig;
use crate::error::ValidatorError;
use crate::messages;
use crate::registry::{PathScope, ValidatorRegistry};
use crate::resolver::IncludeResolver;
use crate::state::TraversalState;
use crate::traits::LicenseOracle;

static DEFAULT_CONFIG: LazyLock<ValidatorConfig> = LazyLock::new(ValidatorConfig::default);

/// Kinds that gather a username and password on the request.
const PASSWORD_SOURCES: &[&str] = &["http_basic", "xpath_credentials", "wss_basic"];

/// Validates one path with fresh traversal state.
pub struct PathValidator<'a> {
    path: &'a AssertionPath,
    context: &'a PolicyValidationContext,
    registry: &'a ValidatorRegistry,
    license: &'a dyn LicenseOracle,
    includes: &'a IncludeResolver<'a>,
    config: &'a ValidatorConfig,
    cancel: Option<&'a CancelHandle>,
    state: TraversalState,
    result: PolicyValidatorResult,
}

impl<'a> PathValidator<'a> {
    pub fn new(
        path: &'a AssertionPath,
        context: &'a PolicyValidationContext,
        registry: &'a ValidatorRegistry,
        license: &'a dyn LicenseOracle,
        includes: &'a IncludeResolver<'a>,
    ) -> Self {
        Self {
            path,
            context,
            registry,
            license,
            includes,
            config: &DEFAULT_CONFIG,
            cancel: None,
            state: TraversalState::new(),
            result: PolicyValidatorResult::new(),
        }
    }

    pub fn with_config(mut self, config: &'a ValidatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cancel(mut self, cancel: &'a CancelHandle) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Walk the path. Cancellation discards everything found so far.
    pub fn validate(mut self) -> Result<PolicyValidatorResult, ValidatorError> {
        let path = self.path;
        let scope = PathScope::new(path, self.context, self.includes);
        let effective: Vec<&Arc<Assertion>> = path
            .iter()
            .filter(|a| a.is_enabled() && !a.is_comment())
            .collect();

        debug!(path = %path.id(), assertions = effective.len(), "validating path");

        for assertion in &effective {
            if let Some(cancel) = self.cancel {
                cancel.check()?;
            }
            self.visit(assertion, &scope);
        }

        for assertion in &effective {
            self.registry
                .resolve(assertion)
                .validate_deferred(assertion, &scope, &mut self.result);
        }

        if self.context.policy_type.is_service_policy() && self.config.summary_warnings {
            self.summarize();
        }

        debug!(
            path = %path.id(),
            errors = self.result.errors().len(),
            warnings = self.result.warnings().len(),
            "path validated"
        );
        Ok(self.result)
    }

    fn visit(&mut self, a: &Arc<Assertion>, scope: &PathScope<'_>) {
        let behavior = self.registry.resolve(a);
        trace!(assertion = %a, behavior = behavior.name(), "visiting assertion");
        behavior.validate(a, scope, &mut self.result);

        if !self.license.is_assertion_enabled(a.meta()) {
            self.warn(a, messages::NOT_LICENSED);
        }
        let unknown = matches!(a.kind(), AssertionKind::Unknown { .. });
        if !unknown && !self.config.is_permitted(&a.name()) {
            self.warn(a, messages::NOT_PERMITTED);
        }

        self.check_preconditions(a);
        self.bookkeep(a);

        self.state.mark_seen(a.target(), a.name());
    }

    fn diagnostic(&self, a: &Arc<Assertion>, message: impl Into<String>) -> Diagnostic {
        Diagnostic::new(a.clone(), message).with_path(self.path.id())
    }

    fn warn(&mut self, a: &Arc<Assertion>, message: impl Into<String>) {
        let diagnostic = self.diagnostic(a, message);
        self.result.add_warning(diagnostic);
    }

    fn warn_with(
        &mut self,
        a: &Arc<Assertion>,
        message: impl Into<String>,
        remedy: RemedialAction,
    ) {
        let diagnostic = self.diagnostic(a, message).with_remedy(remedy);
        self.result.add_warning(diagnostic);
    }

    fn error(&mut self, a: &Arc<Assertion>, message: impl Into<String>) {
        let diagnostic = self.diagnostic(a, message);
        self.result.add_error(diagnostic);
    }

    fn error_with(
        &mut self,
        a: &Arc<Assertion>,
        message: impl Into<String>,
        remedy: RemedialAction,
    ) {
        let diagnostic = self.diagnostic(a, message).with_remedy(remedy);
        self.result.add_error(diagnostic);
    }

    // -- preconditions ------------------------------------------------------

    fn check_preconditions(&mut self, a: &Arc<Assertion>) {
        let routed = self.state.routing;

        if a.meta().requires_soap && !self.context.soap {
            self.warn(a, messages::REQUIRES_SOAP);
        }

        if self.context.soap && involves_signature(a) {
            self.check_wsdl_namespaces(a);
        }

        if !has_own_routing_rule(a) {
            let validates_request = (a.flagged(ValidatorFlag::PerformsValidation)
                || a.flagged(ValidatorFlag::RequireSignature))
                && a.is_request();
            if validates_request && routed && a.is_default_actor() {
                self.warn_with(
                    a,
                    messages::SHOULD_BE_BEFORE_ROUTING,
                    RemedialAction::MoveBeforeRouting,
                );
            } else if a.has(Capability::MessageTargetable)
                && a.is_request()
                && self.state.response_available
                && !a.flagged(ValidatorFlag::MayTargetRequestAfterResponse)
            {
                self.warn(a, messages::REQUEST_AFTER_RESPONSE);
            }
        }

        if a.is_response()
            && !self.state.response_available
            && !a.is_routing()
            && !reads_message_variable(a)
        {
            self.warn_with(
                a,
                messages::RESPONSE_BEFORE_AVAILABLE,
                RemedialAction::MoveAfterRouting,
            );
        }

        if !a.is_default_actor()
            && (a.flagged(ValidatorFlag::PerformsValidation) || a.is_credential_source())
            && !a.flagged(ValidatorFlag::ProcessesNonLocalWssRecipient)
        {
            self.warn(a, messages::NON_LOCAL_RECIPIENT);
        }

        if a.flagged(ValidatorFlag::RequireSignature) && !self.has_signing_identity(a) {
            self.warn(a, messages::missing_prior_security(a.actor()));
        }

        if let Some(identity) = a.identity_target() {
            if identity.kind == IdentityTargetKind::Tag
                && !self.state.has_identity_tag(&identity.identifier)
            {
                self.warn(a, messages::identity_tag_unknown(&identity.identifier));
            }
        }

        match a.kind() {
            AssertionKind::RequestSwa { .. } if a.is_request() && routed => {
                self.error_with(a, messages::SWA_AFTER_ROUTING, RemedialAction::MoveBeforeRouting);
            }
            AssertionKind::Ssl {
                require_client_cert: false,
            } if routed => {
                self.warn_with(
                    a,
                    messages::NORMALLY_BEFORE_ROUTING,
                    RemedialAction::MoveBeforeRouting,
                );
            }
            AssertionKind::WsTrustCredentialExchange => {
                if !self.password_gathered() && !self.saml_gathered() {
                    self.warn_with(
                        a,
                        messages::MISSING_PRIOR_CREDENTIAL,
                        RemedialAction::AddCredentialSource,
                    );
                }
            }
            AssertionKind::WsFederationPassiveTokenRequest => {
                if !self.password_gathered() {
                    self.warn_with(
                        a,
                        messages::MISSING_PRIOR_PASSWORD,
                        RemedialAction::AddCredentialSource,
                    );
                }
            }
            AssertionKind::WsFederationPassiveTokenExchange => {
                if !self.saml_gathered() {
                    self.warn_with(
                        a,
                        messages::SAML_MISSING_BEFORE,
                        RemedialAction::AddCredentialSource,
                    );
                }
            }
            AssertionKind::WssBasic if a.is_request() => {
                if !self.state.has_seen(&MessageTarget::Request, "ssl") {
                    self.warn(a, messages::TRANSPORT_MISSING_BEFORE);
                }
            }
            AssertionKind::AddWssSecurityToken {
                include_password: true,
                use_last_gathered_credentials: true,
                ..
            } => {
                if !self.password_gathered() {
                    self.warn_with(
                        a,
                        messages::MISSING_PASSWORD_COLLECTION,
                        RemedialAction::AddCredentialSource,
                    );
                }
            }
            _ => {}
        }
    }

    fn check_wsdl_namespaces(&mut self, a: &Arc<Assertion>) {
        let Some(wsdl) = &self.context.wsdl else {
            return;
        };
        let operations = match wsdl.binding_operations() {
            Ok(operations) => operations,
            Err(e) => {
                warn!(
                    assertion = %a,
                    error = %e,
                    "WSDL bindings unreadable, skipping namespace check"
                );
                return;
            }
        };

        let mut details = Vec::new();
        for op in &operations {
            let bound = [
                (op.input_namespace.as_deref(), op.input_message_name()),
                (op.output_namespace.as_deref(), op.output_message_name()),
            ];
            for (namespace, message) in bound {
                if let Some(ns) = namespace.filter(|ns| is_relative_uri(ns)) {
                    details.push(messages::relative_namespace_detail(ns, &op.name, &message));
                }
            }
        }
        if !details.is_empty() {
            let message = format!("{} {}", messages::RELATIVE_NAMESPACE, details.join("; "));
            self.error(a, message);
        }
    }

    fn has_signing_identity(&self, a: &Assertion) -> bool {
        let targets = [&MessageTarget::Request, a.target()];
        let actor = a.actor();
        let signed = targets.iter().any(|target| {
            let s = self.state.actor(target, actor);
            s.wss_signature || s.saml_security
        });
        let session = targets.iter().any(|target| {
            ["secure_conversation", "encrypted_username_token", "request_wss_kerberos"]
                .iter()
                .any(|kind| self.state.has_seen(target, kind))
        });
        signed || session || (a.is_response() && self.state.response_security_token)
    }

    fn password_gathered(&self) -> bool {
        PASSWORD_SOURCES
            .iter()
            .any(|kind| self.state.has_seen(&MessageTarget::Request, kind))
    }

    fn saml_gathered(&self) -> bool {
        self.state.has_seen(&MessageTarget::Request, "require_wss_saml")
    }

    // -- bookkeeping --------------------------------------------------------

    fn bookkeep(&mut self, a: &Arc<Assertion>) {
        if a.is_composite() {
            if !a.has_effective_children() {
                self.warn_with(a, messages::EMPTY_COMPOSITE, RemedialAction::RemoveAssertion);
            }
        } else if a.is_credential_modifier() {
            self.credential_modifier(a);
        } else if a.is_credential_source() {
            self.credential_source(a);
        } else if a.is_access_control() {
            self.access_control(a);
        } else if a.is_routing() {
            self.routing(a);
        } else {
            match a.kind() {
                AssertionKind::CustomAccessControl {
                    credential_source: true,
                    ..
                } => self.custom_access_control(a),
                AssertionKind::SamlBrowserArtifact => {
                    let request = self.state.target_mut(&MessageTarget::Request);
                    request.access_control = true;
                    let actor = request.actor_mut(a.actor());
                    actor.credentials = true;
                    actor.credentials_since_modified = true;
                }
                AssertionKind::HtmlFormData if a.is_request() && self.state.routing => {
                    self.warn_with(
                        a,
                        messages::SHOULD_BE_BEFORE_ROUTING,
                        RemedialAction::MoveBeforeRouting,
                    );
                }
                AssertionKind::AddWssSecurityToken {
                    token_type, encrypt, ..
                } => {
                    if matches!(
                        token_type,
                        SecurityTokenType::SecureConversationContext
                            | SecurityTokenType::EncryptedKey
                    ) || (*token_type == SecurityTokenType::Username && *encrypt)
                    {
                        self.state.response_security_token = true;
                    }
                }
                AssertionKind::AddWssUsernameToken { encrypt: true } => {
                    self.state.response_security_token = true;
                }
                _ => {}
            }
        }

        if a.meta().requires_xml {
            self.state.xml_parsing = true;
        }
        if matches!(a.kind(), AssertionKind::True)
            && a.parent().is_some_and(|p| matches!(p.kind(), AssertionKind::All))
        {
            self.warn_with(a, messages::TRUE_UNDER_ALL, RemedialAction::RemoveAssertion);
        }
        if a.has(Capability::WssDecorationConfig) && a.is_response() {
            self.state.record_decorated_response_actor(a.actor());
        }
        if a.has(Capability::IdentityTagable) {
            if let Some(tag) = a.identity_tag() {
                self.state.record_identity_tag(tag);
            }
        }
    }

    fn credential_source(&mut self, a: &Arc<Assertion>) {
        if self.state.routing && a.is_default_actor() && a.is_request() {
            self.warn_with(a, messages::MUST_BE_BEFORE_ROUTING, RemedialAction::MoveBeforeRouting);
        }

        let target = a.target().clone();
        let actor = a.actor().clone();
        let target_key = target.key();
        let before = self.state.actor(&target, &actor);
        let seen_secure_conversation = self.state.has_seen(&target, "secure_conversation");
        let seen_saml = self.state.has_seen(&target, "require_wss_saml");

        if before.credentials_since_modified {
            self.warn(a, messages::CREDENTIALS_ALREADY_PRESENT);
        }

        match a.kind() {
            AssertionKind::RequireWssX509Cert {
                allow_multiple_signatures,
            } => {
                let allows_multiple = self
                    .state
                    .target(&target)
                    .is_some_and(|t| t.allows_multiple_signatures);
                if before.wss_signature && !allows_multiple && !*allow_multiple_signatures {
                    self.error(a, messages::wss_signature_already_required(&target_key));
                }
                if *allow_multiple_signatures {
                    self.state.target_mut(&target).allows_multiple_signatures = true;
                } else if allows_multiple {
                    self.warn(a, messages::MULTIPLE_SIGNATURES_CONFLICTING);
                }
                self.state.target_mut(&target).actor_mut(&actor).wss_signature = true;
            }
            AssertionKind::SecureConversation if seen_secure_conversation => {
                self.error(a, messages::SECURE_CONVERSATION_ALREADY);
            }
            AssertionKind::RequireWssSaml { .. } => {
                if seen_saml {
                    self.error(a, messages::SAML_ALREADY);
                }
                self.state.target_mut(&target).actor_mut(&actor).saml_security = true;
            }
            AssertionKind::RequestWssKerberos | AssertionKind::HttpNegotiate => {
                self.state.target_mut(&target).access_control = true;
            }
            _ => {}
        }

        let state = self.state.target_mut(&target).actor_mut(&actor);
        state.credentials = true;
        state.credentials_since_modified = true;
    }

    fn credential_modifier(&mut self, a: &Arc<Assertion>) {
        if self.state.routing && a.is_default_actor() && a.is_request() {
            self.warn_with(a, messages::MUST_BE_BEFORE_ROUTING, RemedialAction::MoveBeforeRouting);
        }
        if a.is_default_actor() && self.state.access_control(a.target()) {
            self.warn(a, messages::UNCOMMON_MODIFIER);
        }
        self.state
            .target_mut(a.target())
            .actor_mut(a.actor())
            .credentials_since_modified = false;
    }

    fn access_control(&mut self, a: &Arc<Assertion>) {
        let target = a.target().clone();
        if !self.state.actor(&target, a.actor()).credentials {
            self.error_with(
                a,
                messages::no_auth_scheme(a.actor()),
                RemedialAction::AddCredentialSource,
            );
        }
        if self.state.routing && a.is_request() {
            self.warn_with(a, messages::AFTER_ROUTING, RemedialAction::MoveBeforeRouting);
        }

        let (specific_user, authentication, allows_multiple) = self
            .state
            .target(&target)
            .map(|t| (t.specific_user, t.authentication, t.allows_multiple_signatures))
            .unwrap_or_default();
        match a.kind() {
            AssertionKind::SpecificUser { .. } => {
                if specific_user && !allows_multiple {
                    self.warn(a, messages::MULTIPLE_IDENTITIES);
                }
                self.state.target_mut(&target).specific_user = true;
            }
            AssertionKind::Authentication { .. } => {
                if authentication {
                    self.warn(a, messages::MULTIPLE_AUTHENTICATIONS);
                }
                self.state.target_mut(&target).authentication = true;
            }
            _ => {}
        }

        if self.state.custom_access_control {
            self.error(a, messages::CUSTOM_ACCESS_CONFLICT);
        }

        let state = self.state.target_mut(&target);
        state.access_control = true;
        state.identity = true;
        if a.is_request() {
            self.state.record_authenticated_actor(a.actor());
        }
    }

    fn custom_access_control(&mut self, a: &Arc<Assertion>) {
        let target = a.target().clone();
        let (credentials, identity) = self
            .state
            .target(&target)
            .map(|t| (t.has_credentials(), t.identity))
            .unwrap_or_default();

        if !credentials {
            self.warn_with(
                a,
                messages::CUSTOM_ACCESS_NO_CREDENTIALS,
                RemedialAction::AddCredentialSource,
            );
        }
        if self.state.custom_access_control {
            self.warn(a, messages::CUSTOM_ACCESS_ALREADY);
        } else if identity {
            self.error(a, messages::CUSTOM_ACCESS_CONFLICT);
        }
        if self.state.routing && a.is_request() {
            self.warn_with(a, messages::AFTER_ROUTING, RemedialAction::MoveBeforeRouting);
        }

        self.state.custom_access_control = true;
        self.state.target_mut(&target).access_control = true;
    }

    fn routing(&mut self, a: &Arc<Assertion>) {
        if self.context.policy_type == PolicyType::Internal
            && self
                .context
                .policy_tag
                .as_deref()
                .is_some_and(|tag| self.config.is_loop_sensitive(tag))
        {
            self.warn(a, messages::ROUTING_LOOP);
        }

        let sender_vouches = matches!(
            a.kind(),
            AssertionKind::HttpRouting {
                attach_saml_sender_vouches: true,
                ..
            } | AssertionKind::JmsRouting {
                attach_saml_sender_vouches: true,
                ..
            }
        );
        if sender_vouches && !self.state.access_control(&MessageTarget::Request) {
            self.warn_with(
                a,
                messages::SENDER_VOUCHES_UNAUTHENTICATED,
                RemedialAction::AddCredentialSource,
            );
        }

        self.state.routing_present = true;
        if a.kind().routes() {
            self.state.routing = true;
        }
        if a.kind().initializes_response() {
            self.state.response_available = true;
        }
    }

    // -- summary ------------------------------------------------------------

    fn summarize(&mut self) {
        let Some(last) = self.path.last_effective().cloned() else {
            return;
        };

        if !self.state.routing_present {
            self.warn_with(&last, messages::NO_ROUTING, RemedialAction::AddRouting);
        }
        if !self.context.soap && self.state.xml_parsing {
            self.warn(&last, messages::NON_XML_REQUESTS);
        }
        if self.state.has_unauthenticated_credentials() {
            self.warn(&last, messages::CREDENTIALS_NOT_AUTHENTICATED);
        }

        let authenticated = self.state.authenticated_actors();
        let decorated = self.state.decorated_response_actors();
        let mismatch = match (authenticated.first(), decorated.first()) {
            (Some(auth), Some(deco)) if authenticated.is_disjoint(decorated) => Some(
                messages::response_actor_mismatch(&auth.to_string(), &deco.to_string()),
            ),
            _ => None,
        };
        if let Some(message) = mismatch {
            self.warn(&last, message);
        }
    }
}

/// Assertions whose signing depends on WSDL namespaces being absolute.
fn involves_signature(a: &Assertion) -> bool {
    a.flagged(ValidatorFlag::RequireSignature)
        || matches!(
            a.kind(),
            AssertionKind::SecureConversation
                | AssertionKind::RequireWssX509Cert { .. }
                | AssertionKind::WssSignElement { .. }
        )
}

/// Kinds whose position relative to routing is checked by category rules.
fn has_own_routing_rule(a: &Assertion) -> bool {
    a.is_credential_source()
        || a.is_credential_modifier()
        || a.is_access_control()
        || a.is_routing()
        || matches!(
            a.kind(),
            AssertionKind::CustomAccessControl {
                credential_source: true,
                ..
            } | AssertionKind::HtmlFormData
                | AssertionKind::RequestSwa { .. }
        )
}

/// Response XPath reading a message variable instead of the live response.
fn reads_message_variable(a: &Assertion) -> bool {
    matches!(
        a.kind(),
        AssertionKind::ResponseXpath {
            xml_msg_src: Some(_),
            ..
        }
    )
}

fn is_relative_uri(namespace: &str) -> bool {
    !namespace.is_empty() && url::Url::parse(namespace).is_err()
}
