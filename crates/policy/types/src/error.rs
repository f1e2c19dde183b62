use thiserror::Error;

use crate::capability::Capability;

/// Errors raised while constructing a policy model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("assertion kind {kind} does not support capability {capability}")]
    UnsupportedCapability { kind: String, capability: Capability },

    #[error("assertion kind {0} cannot have children")]
    ChildrenOnLeaf(String),

    #[error("assertion is already attached to a parent")]
    AlreadyAttached,

    #[error("invalid policy document: {0}")]
    Document(String),
}

/// Errors reported by a WSDL inspector.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WsdlError {
    #[error("WSDL binding {binding} is invalid: {reason}")]
    InvalidBinding { binding: String, reason: String },

    #[error("WSDL could not be read: {0}")]
    Unreadable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ModelError::UnsupportedCapability {
            kind: "http_basic".into(),
            capability: Capability::PrivateKeyable,
        };
        assert!(err.to_string().contains("http_basic"));
        assert!(err.to_string().contains("PrivateKeyable"));

        let err = WsdlError::InvalidBinding {
            binding: "QuoteBinding".into(),
            reason: "no operations".into(),
        };
        assert!(err.to_string().contains("QuoteBinding"));
    }
}
