//! Declarative JSON form of policies.
//!
//! ```json
//! {
//!   "header": { "guid": "…", "name": "quote-service", "policy_type": "private_service" },
//!   "root": { "type": "all", "children": [
//!     { "type": "http_basic" },
//!     { "type": "specific_user", "provider": "internal", "login": "alice" },
//!     { "type": "http_routing", "url": "http://backend/quote" }
//!   ]}
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::assertion::{Assertion, AssertionBuilder};
use crate::capability::{
    IdentityTarget, MessageTarget, PrivateKeyRef, RecipientContext, VariableMetadata,
    WssDecoration,
};
use crate::error::ModelError;
use crate::ids::PolicyHeader;
use crate::kind::AssertionKind;
use crate::policy::Policy;

fn default_enabled() -> bool {
    true
}

/// Serialized assertion node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionSpec {
    #[serde(flatten)]
    pub kind: AssertionKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<AssertionSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<RecipientContext>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<MessageTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_target: Option<IdentityTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<PrivateKeyRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wss_decoration: Option<WssDecoration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uses_variables: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sets_variables: Vec<VariableMetadata>,
}

impl AssertionSpec {
    pub fn build(self) -> Result<Arc<Assertion>, ModelError> {
        let children = self
            .children
            .into_iter()
            .map(AssertionSpec::build)
            .collect::<Result<Vec<_>, _>>()?;

        let mut builder = AssertionBuilder::new(self.kind)
            .enabled(self.enabled)
            .children(children);
        if let Some(recipient) = self.recipient {
            builder = builder.recipient(recipient);
        }
        if let Some(target) = self.target {
            builder = builder.target(target);
        }
        if let Some(identity_target) = self.identity_target {
            builder = builder.identity_target(identity_target);
        }
        if let Some(tag) = self.identity_tag {
            builder = builder.identity_tag(tag);
        }
        if let Some(key) = self.private_key {
            builder = builder.private_key(key);
        }
        if let Some(decoration) = self.wss_decoration {
            builder = builder.wss_decoration(decoration);
        }
        for expression in self.uses_variables {
            builder = builder.uses_variable(expression);
        }
        for variable in self.sets_variables {
            builder = builder.sets_variable(variable);
        }
        builder.build()
    }
}

/// Serialized policy: header plus tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDocument {
    pub header: PolicyHeader,
    pub root: AssertionSpec,
}

impl PolicyDocument {
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        serde_json::from_str(json).map_err(|e| ModelError::Document(e.to_string()))
    }

    pub fn into_policy(self) -> Result<Policy, ModelError> {
        Ok(Policy::new(self.header, self.root.build()?))
    }
}

/// Parses a bare assertion tree.
pub fn assertion_from_json(json: &str) -> Result<Arc<Assertion>, ModelError> {
    let spec: AssertionSpec =
        serde_json::from_str(json).map_err(|e| ModelError::Document(e.to_string()))?;
    spec.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::RecipientActor;
    use crate::ids::{PolicyGuid, PolicyType};

    #[test]
    fn parses_nested_tree() {
        let root = assertion_from_json(
            r#"{
                "type": "all",
                "children": [
                    { "type": "http_basic" },
                    { "type": "wss_basic", "recipient": { "actor": { "named": "urn:partner" } } },
                    { "type": "comment", "text": "route next", "enabled": false },
                    { "type": "http_routing", "url": "http://backend/quote" }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(root.children().len(), 4);
        assert_eq!(root.children()[1].actor(), &RecipientActor::named("urn:partner"));
        assert!(!root.children()[2].is_enabled());
        assert!(root.children()[3].is_routing());
    }

    #[test]
    fn rejects_capability_data_on_wrong_kind() {
        let err =
            assertion_from_json(r#"{ "type": "http_basic", "target": "response" }"#).unwrap_err();
        assert!(matches!(err, ModelError::UnsupportedCapability { .. }));
    }

    #[test]
    fn malformed_json_is_a_document_error() {
        let err = assertion_from_json(r#"{ "type": "no_such_kind" }"#).unwrap_err();
        assert!(matches!(err, ModelError::Document(_)));
    }

    #[test]
    fn policy_document_round_trip() {
        let guid = PolicyGuid::generate();
        let json = format!(
            r#"{{
                "header": {{ "guid": "{guid}", "name": "frag", "policy_type": "include_fragment" }},
                "root": {{ "type": "all", "children": [ {{ "type": "audit" }} ] }}
            }}"#
        );
        let policy = PolicyDocument::from_json(&json).unwrap().into_policy().unwrap();
        assert_eq!(policy.guid(), guid);
        assert_eq!(policy.policy_type(), PolicyType::IncludeFragment);
        assert_eq!(policy.root().children().len(), 1);
    }
}
