//! Per-kind metadata consulted by the validator.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeSet;

use crate::capability::Capability;

/// Flags that adjust how the path engine treats an assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorFlag {
    /// Checks the request and must run before routing.
    PerformsValidation,
    /// Needs a signature-establishing assertion earlier for the same actor.
    RequireSignature,
    /// May target the request even after the response is available.
    MayTargetRequestAfterResponse,
    /// Enforces its checks even for a non-local WS-Security recipient.
    ProcessesNonLocalWssRecipient,
}

/// Metadata of an assertion kind.
///
/// Built-in kinds derive theirs from [`AssertionKind`](crate::AssertionKind);
/// extension kinds declare it in full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionMetadata {
    pub name: Cow<'static, str>,
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,
    #[serde(default)]
    pub flags: BTreeSet<ValidatorFlag>,
    #[serde(default)]
    pub requires_soap: bool,
    #[serde(default)]
    pub requires_xml: bool,
    #[serde(default)]
    pub is_routing: bool,
    /// Named validator behavior to resolve when no specialized one exists.
    #[serde(default)]
    pub validator: Option<Cow<'static, str>>,
    /// License feature gating this kind. Defaults to `assertion:<name>`.
    #[serde(default)]
    pub feature_set: Option<Cow<'static, str>>,
}

impl AssertionMetadata {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            capabilities: BTreeSet::new(),
            flags: BTreeSet::new(),
            requires_soap: false,
            requires_xml: false,
            is_routing: false,
            validator: None,
            feature_set: None,
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        if capability == Capability::Routing {
            self.is_routing = true;
        }
        self
    }

    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        for capability in capabilities {
            self = self.with_capability(capability);
        }
        self
    }

    pub fn with_flag(mut self, flag: ValidatorFlag) -> Self {
        self.flags.insert(flag);
        self
    }

    pub fn requiring_soap(mut self) -> Self {
        self.requires_soap = true;
        self.requires_xml = true;
        self
    }

    pub fn requiring_xml(mut self) -> Self {
        self.requires_xml = true;
        self
    }

    pub fn with_validator(mut self, validator: impl Into<Cow<'static, str>>) -> Self {
        self.validator = Some(validator.into());
        self
    }

    pub fn with_feature_set(mut self, feature_set: impl Into<Cow<'static, str>>) -> Self {
        self.feature_set = Some(feature_set.into());
        self
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn flagged(&self, flag: ValidatorFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn feature_set_name(&self) -> Cow<'_, str> {
        match &self.feature_set {
            Some(name) => Cow::Borrowed(name.as_ref()),
            None => Cow::Owned(format!("assertion:{}", self.name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_capability_marks_routing() {
        let meta = AssertionMetadata::new("custom_route").with_capability(Capability::Routing);
        assert!(meta.is_routing);
        assert!(meta.has(Capability::Routing));
    }

    #[test]
    fn feature_set_defaults_to_kind_name() {
        let meta = AssertionMetadata::new("regex");
        assert_eq!(meta.feature_set_name(), "assertion:regex");
        let meta = meta.with_feature_set("set:text");
        assert_eq!(meta.feature_set_name(), "set:text");
    }

    #[test]
    fn soap_implies_xml() {
        let meta = AssertionMetadata::new("wss").requiring_soap();
        assert!(meta.requires_xml);
    }

    #[test]
    fn deserializes_with_defaults() {
        let meta: AssertionMetadata = serde_json::from_str(
            r#"{"name":"acme_check","capabilities":["uses_variables"],"validator":"variables"}"#,
        )
        .unwrap();
        assert_eq!(meta.name, "acme_check");
        assert!(meta.has(Capability::UsesVariables));
        assert!(!meta.requires_soap);
        assert_eq!(meta.validator.as_deref(), Some("variables"));
    }
}
