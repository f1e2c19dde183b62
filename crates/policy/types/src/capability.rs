//! Capabilities an assertion kind may advertise, and the data each one carries.
//!
//! A capability is either present together with its data or absent. Data for
//! the data-bearing capabilities is attached through
//! [`AssertionBuilder`](crate::AssertionBuilder); when the builder is given
//! nothing, the defaults defined here are installed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Capability advertised by an assertion kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Gathers credentials from the message or transport.
    CredentialSource,
    /// Replaces previously gathered credentials (token exchange).
    CredentialModifier,
    /// Authenticates or authorizes gathered credentials.
    AccessControl,
    /// Sends the request somewhere and obtains a response.
    Routing,
    /// References context variables in its configuration.
    UsesVariables,
    /// Defines context variables for later assertions.
    SetsVariables,
    /// Applies to a specific identity gathered earlier.
    IdentityTargetable,
    /// Labels the identity it authenticates with a tag.
    IdentityTagable,
    /// Operates on the security header of a given WS-Security actor.
    SecurityHeaderAddressable,
    /// Signs with a configurable private key.
    PrivateKeyable,
    /// Carries WS-Security decoration settings.
    WssDecorationConfig,
    /// Carries XML namespace prefix bindings.
    NamespaceMigratable,
    /// Operates on the request, the response, or a message variable.
    MessageTargetable,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// WS-Security actor (recipient) an assertion's security processing applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientActor {
    /// The gateway itself; the default actor.
    Local,
    /// A downstream intermediary identified by its actor URI.
    Named(String),
}

impl RecipientActor {
    pub fn named(actor: impl Into<String>) -> Self {
        RecipientActor::Named(actor.into())
    }

    pub fn is_local(&self) -> bool {
        matches!(self, RecipientActor::Local)
    }
}

impl Default for RecipientActor {
    fn default() -> Self {
        RecipientActor::Local
    }
}

impl fmt::Display for RecipientActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecipientActor::Local => f.write_str("local"),
            RecipientActor::Named(actor) => f.write_str(actor),
        }
    }
}

/// Data of [`Capability::SecurityHeaderAddressable`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecipientContext {
    pub actor: RecipientActor,
    /// Base64 certificate of the intermediary, for named actors.
    #[serde(default)]
    pub certificate: Option<String>,
}

impl RecipientContext {
    pub fn local() -> Self {
        Self::default()
    }

    pub fn for_actor(actor: impl Into<String>) -> Self {
        Self {
            actor: RecipientActor::named(actor),
            certificate: None,
        }
    }

    pub fn is_local(&self) -> bool {
        self.actor.is_local()
    }
}

/// Data of [`Capability::MessageTargetable`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageTarget {
    Request,
    Response,
    /// A message held in a context variable.
    Variable(String),
}

impl MessageTarget {
    /// Key used to group per-target traversal state. Variable names match
    /// case-insensitively.
    pub fn key(&self) -> String {
        match self {
            MessageTarget::Request => "request".to_string(),
            MessageTarget::Response => "response".to_string(),
            MessageTarget::Variable(name) => name.to_lowercase(),
        }
    }
}

impl fmt::Display for MessageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageTarget::Request => f.write_str("request"),
            MessageTarget::Response => f.write_str("response"),
            MessageTarget::Variable(name) => write!(f, "${{{name}}}"),
        }
    }
}

/// Declared type of a context variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    #[default]
    String,
    Integer,
    Boolean,
    Message,
    Element,
}

/// One variable declared by a [`Capability::SetsVariables`] assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableMetadata {
    pub name: String,
    /// Whether `name.<suffix>` references resolve to this variable.
    #[serde(default)]
    pub prefixed: bool,
    #[serde(default)]
    pub multivalued: bool,
    #[serde(default)]
    pub variable_type: VariableType,
}

impl VariableMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefixed: false,
            multivalued: false,
            variable_type: VariableType::String,
        }
    }

    pub fn prefixed(mut self) -> Self {
        self.prefixed = true;
        self
    }

    pub fn multivalued(mut self) -> Self {
        self.multivalued = true;
        self
    }

    pub fn with_type(mut self, variable_type: VariableType) -> Self {
        self.variable_type = variable_type;
        self
    }
}

/// How an [`IdentityTarget`] selects an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityTargetKind {
    Provider,
    User,
    Group,
    /// Identity labelled by an [`Capability::IdentityTagable`] assertion.
    Tag,
}

/// Data of [`Capability::IdentityTargetable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityTarget {
    pub kind: IdentityTargetKind,
    pub identifier: String,
}

impl IdentityTarget {
    pub fn tag(tag: impl Into<String>) -> Self {
        Self {
            kind: IdentityTargetKind::Tag,
            identifier: tag.into(),
        }
    }

    pub fn user(login: impl Into<String>) -> Self {
        Self {
            kind: IdentityTargetKind::User,
            identifier: login.into(),
        }
    }
}

/// Data of [`Capability::PrivateKeyable`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateKeyRef {
    pub uses_default_key: bool,
    #[serde(default)]
    pub keystore: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
}

impl PrivateKeyRef {
    pub fn default_key() -> Self {
        Self {
            uses_default_key: true,
            keystore: None,
            alias: None,
        }
    }

    pub fn alias(keystore: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            uses_default_key: false,
            keystore: Some(keystore.into()),
            alias: Some(alias.into()),
        }
    }
}

impl Default for PrivateKeyRef {
    fn default() -> Self {
        Self::default_key()
    }
}

/// Key reference type used when signing a decorated message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyReference {
    #[default]
    BinarySecurityToken,
    SubjectKeyIdentifier,
    IssuerSerial,
    KeyName,
}

/// Data of [`Capability::WssDecorationConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WssDecoration {
    #[serde(default)]
    pub key_reference: KeyReference,
    #[serde(default)]
    pub protect_tokens: bool,
    #[serde(default)]
    pub use_derived_keys: bool,
    #[serde(default = "default_true")]
    pub include_timestamp: bool,
}

fn default_true() -> bool {
    true
}

impl Default for WssDecoration {
    fn default() -> Self {
        Self {
            key_reference: KeyReference::BinarySecurityToken,
            protect_tokens: false,
            use_derived_keys: false,
            include_timestamp: true,
        }
    }
}

/// Data of [`Capability::NamespaceMigratable`]: prefix to namespace URI.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamespaceMap(BTreeMap<String, String>);

impl NamespaceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.0.insert(prefix.into(), uri.into());
        self
    }

    pub fn uri(&self, prefix: &str) -> Option<&str> {
        self.0.get(prefix).map(String::as_str)
    }

    pub fn contains_prefix(&self, prefix: &str) -> bool {
        self.0.contains_key(prefix)
    }

    pub fn uris(&self) -> impl Iterator<Item = &str> {
        self.0.values().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for NamespaceMap {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_targets_key_case_insensitively() {
        assert_eq!(MessageTarget::Variable("MyMsg".into()).key(), "mymsg");
        assert_eq!(MessageTarget::Request.key(), "request");
        assert_eq!(MessageTarget::Variable("x".into()).to_string(), "${x}");
    }

    #[test]
    fn recipient_defaults_to_local() {
        assert!(RecipientContext::default().is_local());
        let ctx = RecipientContext::for_actor("urn:downstream");
        assert_eq!(ctx.actor.to_string(), "urn:downstream");
        assert!(!ctx.is_local());
    }

    #[test]
    fn namespace_map_lookup() {
        let ns = NamespaceMap::new()
            .with("soapenv", "http://schemas.xmlsoap.org/soap/envelope/")
            .with("tns", "urn:svc");
        assert_eq!(ns.uri("tns"), Some("urn:svc"));
        assert!(!ns.contains_prefix("wsse"));
        assert_eq!(ns.uris().count(), 2);
    }

    #[test]
    fn capabilities_serialize_snake_case() {
        let json = serde_json::to_string(&Capability::SecurityHeaderAddressable).unwrap();
        assert_eq!(json, "\"security_header_addressable\"");
    }
}
