//! The closed set of assertion kinds and their per-kind data.
//!
//! Structural kinds (`All`, `OneOrMore`, `Include`, `Comment`) are the ones the
//! validator reasons about directly. Every other kind is a leaf whose rule
//! logic is resolved through the validator registry, keyed by [`AssertionKind::name`].

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::capability::{Capability, MessageTarget, NamespaceMap, VariableMetadata};
use crate::ids::PolicyGuid;
use crate::metadata::{AssertionMetadata, ValidatorFlag};

/// SAML subject confirmation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofOfPossession {
    #[default]
    HolderOfKey,
    SenderVouches,
    Bearer,
}

/// Token type added by [`AssertionKind::AddWssSecurityToken`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityTokenType {
    #[default]
    Username,
    X509,
    Saml,
    SecureConversationContext,
    EncryptedKey,
}

/// Where an XSL transformation gets its stylesheet.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StylesheetSource {
    /// Stylesheet text stored in the policy.
    #[default]
    Static,
    /// URL taken from an `xml-stylesheet` processing instruction in the message.
    MessageUrl,
    /// Fixed remote URL; may reference context variables.
    RemoteUrl(String),
}

/// Kind declared entirely by metadata, for assertions contributed by modules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionAssertion {
    pub meta: AssertionMetadata,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl ExtensionAssertion {
    pub fn new(meta: AssertionMetadata) -> Self {
        Self {
            meta,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Kind of an assertion, with the configuration specific to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssertionKind {
    // Structural
    All,
    OneOrMore,
    Comment {
        #[serde(default)]
        text: String,
    },
    True,
    False,
    Include {
        guid: PolicyGuid,
        #[serde(default)]
        name: String,
    },

    // Transport credentials
    HttpBasic,
    HttpDigest,
    HttpNegotiate,
    Ssl {
        #[serde(default)]
        require_client_cert: bool,
    },
    XpathCredentials {
        expression: String,
        #[serde(default)]
        namespaces: NamespaceMap,
    },

    // WS-Security credentials
    WssBasic,
    EncryptedUsernameToken,
    RequireWssX509Cert {
        #[serde(default)]
        allow_multiple_signatures: bool,
    },
    SecureConversation,
    RequireWssSaml {
        #[serde(default)]
        confirmation: ProofOfPossession,
    },
    RequestWssKerberos,

    // WS-Security message checks
    RequireWssSignedElement {
        xpath: String,
        #[serde(default)]
        namespaces: NamespaceMap,
    },
    RequireWssEncryptedElement {
        xpath: String,
        #[serde(default)]
        namespaces: NamespaceMap,
    },
    RequireWssTimestamp {
        #[serde(default)]
        signature_required: bool,
    },
    WssReplayProtection,
    WssVersion,

    // WS-Security decoration
    WssSignElement {
        xpath: String,
        #[serde(default)]
        namespaces: NamespaceMap,
    },
    WssEncryptElement {
        xpath: String,
        #[serde(default)]
        namespaces: NamespaceMap,
    },
    AddWssSecurityToken {
        #[serde(default)]
        token_type: SecurityTokenType,
        #[serde(default)]
        include_password: bool,
        #[serde(default)]
        use_last_gathered_credentials: bool,
        #[serde(default)]
        encrypt: bool,
    },
    AddWssTimestamp {
        #[serde(default)]
        signature_required: bool,
    },
    AddWssUsernameToken {
        #[serde(default)]
        encrypt: bool,
    },

    // Message content
    RequestSwa {
        #[serde(default)]
        requires_signature: bool,
    },
    RequestXpath {
        expression: String,
        #[serde(default)]
        namespaces: NamespaceMap,
    },
    ResponseXpath {
        expression: String,
        #[serde(default)]
        namespaces: NamespaceMap,
        /// Variable holding the message to evaluate instead of the response.
        #[serde(default)]
        xml_msg_src: Option<String>,
    },
    XslTransformation {
        #[serde(default)]
        source: StylesheetSource,
    },
    Regex {
        pattern: String,
        #[serde(default)]
        encoding: Option<String>,
    },
    HtmlFormData,
    SchemaValidation {
        #[serde(default)]
        schema: String,
    },

    // Routing
    HttpRouting {
        #[serde(default)]
        url: Option<String>,
        /// When non-empty the main URL is ignored.
        #[serde(default)]
        custom_urls: Vec<String>,
        #[serde(default)]
        attach_saml_sender_vouches: bool,
    },
    JmsRouting {
        #[serde(default)]
        endpoint: Option<String>,
        #[serde(default)]
        attach_saml_sender_vouches: bool,
    },
    /// Copies the request into the response without routing.
    EchoRouting,

    // Identity
    SpecificUser {
        provider: String,
        login: String,
    },
    MemberOfGroup {
        provider: String,
        group: String,
    },
    Authentication {
        provider: String,
    },
    CustomAccessControl {
        name: String,
        #[serde(default)]
        credential_source: bool,
    },
    SamlBrowserArtifact,

    // Federation
    WsTrustCredentialExchange,
    WsFederationPassiveTokenRequest,
    WsFederationPassiveTokenExchange,

    // Miscellaneous
    Audit {
        #[serde(default)]
        save_request: bool,
        #[serde(default)]
        save_response: bool,
    },
    SetVariable {
        name: String,
        #[serde(default)]
        expression: String,
    },
    /// Assertion whose serialized form could not be understood.
    Unknown {
        name: String,
        #[serde(default)]
        detail: Option<String>,
    },
    Extension(ExtensionAssertion),
}

impl AssertionKind {
    /// Stable kind name; the registry key for rule behaviors.
    pub fn name(&self) -> Cow<'static, str> {
        let name = match self {
            AssertionKind::All => "all",
            AssertionKind::OneOrMore => "one_or_more",
            AssertionKind::Comment { .. } => "comment",
            AssertionKind::True => "true",
            AssertionKind::False => "false",
            AssertionKind::Include { .. } => "include",
            AssertionKind::HttpBasic => "http_basic",
            AssertionKind::HttpDigest => "http_digest",
            AssertionKind::HttpNegotiate => "http_negotiate",
            AssertionKind::Ssl { .. } => "ssl",
            AssertionKind::XpathCredentials { .. } => "xpath_credentials",
            AssertionKind::WssBasic => "wss_basic",
            AssertionKind::EncryptedUsernameToken => "encrypted_username_token",
            AssertionKind::RequireWssX509Cert { .. } => "require_wss_x509_cert",
            AssertionKind::SecureConversation => "secure_conversation",
            AssertionKind::RequireWssSaml { .. } => "require_wss_saml",
            AssertionKind::RequestWssKerberos => "request_wss_kerberos",
            AssertionKind::RequireWssSignedElement { .. } => "require_wss_signed_element",
            AssertionKind::RequireWssEncryptedElement { .. } => "require_wss_encrypted_element",
            AssertionKind::RequireWssTimestamp { .. } => "require_wss_timestamp",
            AssertionKind::WssReplayProtection => "wss_replay_protection",
            AssertionKind::WssVersion => "wss_version",
            AssertionKind::WssSignElement { .. } => "wss_sign_element",
            AssertionKind::WssEncryptElement { .. } => "wss_encrypt_element",
            AssertionKind::AddWssSecurityToken { .. } => "add_wss_security_token",
            AssertionKind::AddWssTimestamp { .. } => "add_wss_timestamp",
            AssertionKind::AddWssUsernameToken { .. } => "add_wss_username_token",
            AssertionKind::RequestSwa { .. } => "request_swa",
            AssertionKind::RequestXpath { .. } => "request_xpath",
            AssertionKind::ResponseXpath { .. } => "response_xpath",
            AssertionKind::XslTransformation { .. } => "xsl_transformation",
            AssertionKind::Regex { .. } => "regex",
            AssertionKind::HtmlFormData => "html_form_data",
            AssertionKind::SchemaValidation { .. } => "schema_validation",
            AssertionKind::HttpRouting { .. } => "http_routing",
            AssertionKind::JmsRouting { .. } => "jms_routing",
            AssertionKind::EchoRouting => "echo_routing",
            AssertionKind::SpecificUser { .. } => "specific_user",
            AssertionKind::MemberOfGroup { .. } => "member_of_group",
            AssertionKind::Authentication { .. } => "authentication",
            AssertionKind::CustomAccessControl { .. } => "custom_access_control",
            AssertionKind::SamlBrowserArtifact => "saml_browser_artifact",
            AssertionKind::WsTrustCredentialExchange => "ws_trust_credential_exchange",
            AssertionKind::WsFederationPassiveTokenRequest => "ws_federation_passive_token_request",
            AssertionKind::WsFederationPassiveTokenExchange => {
                "ws_federation_passive_token_exchange"
            }
            AssertionKind::Audit { .. } => "audit",
            AssertionKind::SetVariable { .. } => "set_variable",
            AssertionKind::Unknown { .. } => "unknown",
            AssertionKind::Extension(ext) => return ext.meta.name.clone(),
        };
        Cow::Borrowed(name)
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, AssertionKind::All | AssertionKind::OneOrMore)
    }

    /// Metadata for this kind, derived from its configuration.
    pub fn metadata(&self) -> AssertionMetadata {
        use Capability::*;
        use ValidatorFlag::*;

        let meta = AssertionMetadata::new(self.name());
        let wss_credential = [CredentialSource, SecurityHeaderAddressable, MessageTargetable];
        let wss_decoration = [SecurityHeaderAddressable, MessageTargetable, WssDecorationConfig];
        let identity = [
            AccessControl,
            SecurityHeaderAddressable,
            MessageTargetable,
            IdentityTagable,
        ];

        match self {
            AssertionKind::HttpBasic | AssertionKind::HttpDigest | AssertionKind::HttpNegotiate => {
                meta.with_capability(CredentialSource)
            }
            AssertionKind::Ssl { require_client_cert } => {
                if *require_client_cert {
                    meta.with_capability(CredentialSource)
                } else {
                    meta
                }
            }
            AssertionKind::XpathCredentials { .. } => meta
                .with_capabilities([
                    CredentialSource,
                    NamespaceMigratable,
                    MessageTargetable,
                    UsesVariables,
                ])
                .requiring_xml(),
            AssertionKind::WssBasic
            | AssertionKind::EncryptedUsernameToken
            | AssertionKind::RequireWssX509Cert { .. }
            | AssertionKind::SecureConversation
            | AssertionKind::RequireWssSaml { .. } => {
                meta.with_capabilities(wss_credential).requiring_soap()
            }
            AssertionKind::RequestWssKerberos => meta
                .with_capabilities([CredentialSource, SecurityHeaderAddressable])
                .requiring_soap(),
            AssertionKind::RequireWssSignedElement { .. } => meta
                .with_capabilities([
                    SecurityHeaderAddressable,
                    MessageTargetable,
                    NamespaceMigratable,
                    IdentityTargetable,
                    UsesVariables,
                ])
                .with_flag(PerformsValidation)
                .with_flag(RequireSignature)
                .requiring_soap(),
            AssertionKind::RequireWssEncryptedElement { .. } => meta
                .with_capabilities([
                    SecurityHeaderAddressable,
                    MessageTargetable,
                    NamespaceMigratable,
                    UsesVariables,
                ])
                .with_flag(PerformsValidation)
                .requiring_soap(),
            AssertionKind::RequireWssTimestamp { signature_required } => {
                let meta = meta
                    .with_capabilities([SecurityHeaderAddressable, MessageTargetable])
                    .with_flag(PerformsValidation)
                    .requiring_soap();
                if *signature_required {
                    meta.with_flag(RequireSignature)
                } else {
                    meta
                }
            }
            AssertionKind::WssReplayProtection => meta
                .with_capabilities([SecurityHeaderAddressable, MessageTargetable])
                .with_flag(PerformsValidation)
                .with_flag(RequireSignature)
                .requiring_soap(),
            AssertionKind::WssVersion => meta.requiring_soap(),
            AssertionKind::WssSignElement { .. } => meta
                .with_capabilities(wss_decoration)
                .with_capabilities([
                    NamespaceMigratable,
                    IdentityTargetable,
                    PrivateKeyable,
                    UsesVariables,
                ])
                .requiring_soap(),
            AssertionKind::WssEncryptElement { .. } => meta
                .with_capabilities(wss_decoration)
                .with_capabilities([NamespaceMigratable, IdentityTargetable, UsesVariables])
                .with_flag(RequireSignature)
                .requiring_soap(),
            AssertionKind::AddWssSecurityToken { .. } => meta
                .with_capabilities(wss_decoration)
                .with_capability(PrivateKeyable)
                .requiring_soap(),
            AssertionKind::AddWssTimestamp { .. } | AssertionKind::AddWssUsernameToken { .. } => {
                meta.with_capabilities(wss_decoration).requiring_soap()
            }
            AssertionKind::RequestSwa { requires_signature } => {
                let meta = meta.with_capability(MessageTargetable).requiring_soap();
                if *requires_signature {
                    meta.with_flag(RequireSignature)
                } else {
                    meta
                }
            }
            AssertionKind::RequestXpath { .. } => meta
                .with_capabilities([MessageTargetable, NamespaceMigratable, UsesVariables])
                .with_flag(PerformsValidation)
                .requiring_xml(),
            AssertionKind::ResponseXpath { .. } => meta
                .with_capabilities([MessageTargetable, NamespaceMigratable, UsesVariables])
                .requiring_xml(),
            AssertionKind::XslTransformation { .. } => meta
                .with_capabilities([MessageTargetable, UsesVariables])
                .requiring_xml(),
            AssertionKind::Regex { .. } | AssertionKind::HtmlFormData => {
                meta.with_capability(MessageTargetable)
            }
            AssertionKind::SchemaValidation { .. } => meta
                .with_capability(MessageTargetable)
                .with_flag(PerformsValidation)
                .requiring_xml(),
            AssertionKind::HttpRouting { .. } => meta.with_capabilities([Routing, UsesVariables]),
            AssertionKind::JmsRouting { .. } | AssertionKind::EchoRouting => {
                meta.with_capability(Routing)
            }
            AssertionKind::SpecificUser { .. }
            | AssertionKind::MemberOfGroup { .. }
            | AssertionKind::Authentication { .. } => meta.with_capabilities(identity),
            AssertionKind::CustomAccessControl { .. } => meta.with_capability(MessageTargetable),
            AssertionKind::WsTrustCredentialExchange => meta
                .with_capabilities([CredentialModifier, MessageTargetable])
                .requiring_soap(),
            AssertionKind::WsFederationPassiveTokenRequest
            | AssertionKind::WsFederationPassiveTokenExchange => {
                meta.with_capabilities([CredentialModifier, MessageTargetable])
            }
            AssertionKind::SetVariable { .. } => {
                meta.with_capabilities([UsesVariables, SetsVariables])
            }
            AssertionKind::All
            | AssertionKind::OneOrMore
            | AssertionKind::Comment { .. }
            | AssertionKind::True
            | AssertionKind::False
            | AssertionKind::Include { .. }
            | AssertionKind::SamlBrowserArtifact
            | AssertionKind::Audit { .. }
            | AssertionKind::Unknown { .. } => meta,
            AssertionKind::Extension(ext) => {
                let mut declared = ext.meta.clone();
                declared.is_routing |= declared.has(Routing);
                declared
            }
        }
    }

    /// Target used when a message-targetable assertion is given none.
    pub fn default_target(&self) -> MessageTarget {
        match self {
            AssertionKind::ResponseXpath { .. }
            | AssertionKind::WssSignElement { .. }
            | AssertionKind::WssEncryptElement { .. }
            | AssertionKind::AddWssSecurityToken { .. }
            | AssertionKind::AddWssTimestamp { .. } => MessageTarget::Response,
            _ => MessageTarget::Request,
        }
    }

    /// Whether a routing kind actually sends the message somewhere.
    pub fn routes(&self) -> bool {
        match self {
            AssertionKind::HttpRouting { .. } | AssertionKind::JmsRouting { .. } => true,
            AssertionKind::Extension(ext) => {
                ext.meta.is_routing || ext.meta.has(Capability::Routing)
            }
            _ => false,
        }
    }

    /// Whether the response is available once this kind has run.
    pub fn initializes_response(&self) -> bool {
        match self {
            AssertionKind::HttpRouting { .. }
            | AssertionKind::JmsRouting { .. }
            | AssertionKind::EchoRouting => true,
            AssertionKind::Extension(ext) => {
                ext.meta.is_routing || ext.meta.has(Capability::Routing)
            }
            _ => false,
        }
    }

    /// Namespace bindings held in the kind configuration.
    pub fn namespaces(&self) -> Option<&NamespaceMap> {
        match self {
            AssertionKind::XpathCredentials { namespaces, .. }
            | AssertionKind::RequireWssSignedElement { namespaces, .. }
            | AssertionKind::RequireWssEncryptedElement { namespaces, .. }
            | AssertionKind::WssSignElement { namespaces, .. }
            | AssertionKind::WssEncryptElement { namespaces, .. }
            | AssertionKind::RequestXpath { namespaces, .. }
            | AssertionKind::ResponseXpath { namespaces, .. } => Some(namespaces),
            _ => None,
        }
    }

    /// XPath expression held in the kind configuration.
    pub fn xpath_expression(&self) -> Option<&str> {
        match self {
            AssertionKind::XpathCredentials { expression, .. }
            | AssertionKind::RequestXpath { expression, .. }
            | AssertionKind::ResponseXpath { expression, .. } => Some(expression),
            AssertionKind::RequireWssSignedElement { xpath, .. }
            | AssertionKind::RequireWssEncryptedElement { xpath, .. }
            | AssertionKind::WssSignElement { xpath, .. }
            | AssertionKind::WssEncryptElement { xpath, .. } => Some(xpath),
            _ => None,
        }
    }

    /// Configuration strings that may contain `${...}` variable references.
    pub(crate) fn variable_expressions(&self) -> Vec<String> {
        match self {
            AssertionKind::HttpRouting { url, custom_urls, .. } => {
                url.iter().chain(custom_urls.iter()).cloned().collect()
            }
            AssertionKind::SetVariable { expression, .. } => vec![expression.clone()],
            AssertionKind::ResponseXpath {
                expression,
                xml_msg_src,
                ..
            } => {
                let mut expressions = vec![expression.clone()];
                if let Some(source) = xml_msg_src {
                    expressions.push(format!("${{{source}}}"));
                }
                expressions
            }
            AssertionKind::XslTransformation {
                source: StylesheetSource::RemoteUrl(url),
            } => vec![url.clone()],
            other => other
                .xpath_expression()
                .map(|expression| vec![expression.to_string()])
                .unwrap_or_default(),
        }
    }

    /// Variables defined by the kind configuration.
    pub(crate) fn declared_variables(&self) -> Vec<VariableMetadata> {
        match self {
            AssertionKind::SetVariable { name, .. } => vec![VariableMetadata::new(name.clone())],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_match_serialized_tags() {
        let kind = AssertionKind::HttpRouting {
            url: Some("http://backend/".into()),
            custom_urls: vec![],
            attach_saml_sender_vouches: false,
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], kind.name().as_ref());

        let kind = AssertionKind::RequireWssX509Cert {
            allow_multiple_signatures: true,
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "require_wss_x509_cert");
    }

    #[test]
    fn ssl_is_credential_source_only_with_client_cert() {
        let plain = AssertionKind::Ssl {
            require_client_cert: false,
        };
        let client_cert = AssertionKind::Ssl {
            require_client_cert: true,
        };
        assert!(!plain.metadata().has(Capability::CredentialSource));
        assert!(client_cert.metadata().has(Capability::CredentialSource));
    }

    #[test]
    fn wss_kinds_require_soap() {
        let meta = AssertionKind::WssBasic.metadata();
        assert!(meta.requires_soap);
        assert!(meta.has(Capability::SecurityHeaderAddressable));
        assert!(!AssertionKind::HttpBasic.metadata().requires_soap);
    }

    #[test]
    fn routing_classification() {
        let echo = AssertionKind::EchoRouting;
        assert!(echo.metadata().is_routing);
        assert!(!echo.routes());
        assert!(echo.initializes_response());

        let jms = AssertionKind::JmsRouting {
            endpoint: None,
            attach_saml_sender_vouches: false,
        };
        assert!(jms.routes());
    }

    #[test]
    fn timestamp_signature_flag_follows_configuration() {
        let unsigned = AssertionKind::RequireWssTimestamp {
            signature_required: false,
        };
        let signed = AssertionKind::RequireWssTimestamp {
            signature_required: true,
        };
        assert!(!unsigned.metadata().flagged(ValidatorFlag::RequireSignature));
        assert!(signed.metadata().flagged(ValidatorFlag::RequireSignature));
    }

    #[test]
    fn response_xpath_source_counts_as_variable_use() {
        let kind = AssertionKind::ResponseXpath {
            expression: "/a".into(),
            namespaces: NamespaceMap::new(),
            xml_msg_src: Some("saved".into()),
        };
        assert_eq!(kind.variable_expressions(), vec!["/a".to_string(), "${saved}".to_string()]);
    }

    #[test]
    fn extension_name_comes_from_metadata() {
        let kind = AssertionKind::Extension(ExtensionAssertion::new(
            AssertionMetadata::new("acme_throttle").with_capability(Capability::Routing),
        ));
        assert_eq!(kind.name(), "acme_throttle");
        assert!(kind.metadata().is_routing);
        assert!(kind.routes());
    }

    #[test]
    fn deserializes_from_tagged_json() {
        let json = r#"{"type":"specific_user","provider":"ldap","login":"alice"}"#;
        let kind: AssertionKind = serde_json::from_str(json).unwrap();
        assert_eq!(
            kind,
            AssertionKind::SpecificUser {
                provider: "ldap".into(),
                login: "alice".into()
            }
        );
    }
}
