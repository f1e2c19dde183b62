use policy_types::{Assertion, PolicyGuid};
use std::sync::Arc;
use thiserror::Error;

/// Errors that end a validation call. Findings about the policy itself are
/// diagnostics, never errors.
#[derive(Error, Debug)]
pub enum ValidatorError {
    #[error("policy validation was cancelled")]
    Cancelled,

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

impl ValidatorError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ValidatorError::Cancelled)
    }
}

/// Errors from building or installing a validator registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("kind {kind} is bound to unknown validator {validator}")]
    UnknownValidator { kind: String, validator: String },

    #[error("validator name {0} is registered twice")]
    DuplicateValidator(String),

    #[error("the process-wide registry is already installed")]
    AlreadyInstalled,
}

/// Errors loading validator configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors from the policy fragment lookup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("policy store unavailable: {0}")]
    Unavailable(String),

    #[error("policy {guid} could not be loaded: {reason}")]
    Corrupt { guid: PolicyGuid, reason: String },
}

/// Include problem surfaced before path generation.
#[derive(Error, Debug, Clone)]
#[error("include of {guid} cannot be resolved: {reason}")]
pub struct FragmentError {
    pub include: Arc<Assertion>,
    pub guid: PolicyGuid,
    pub reason: String,
}

/// Errors from the path builder.
#[derive(Error, Debug, Clone)]
pub enum PathBuildError {
    #[error("policy expands to more than {limit} paths")]
    TooManyPaths { limit: usize },

    #[error("fragment lookup failed while building paths: {0}")]
    Lookup(#[from] LookupError),
}

/// Malformed `${...}` reference in an assertion's configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VariableSyntaxError {
    #[error("unterminated variable reference at offset {offset} in {expression:?}")]
    Unterminated { expression: String, offset: usize },

    #[error("empty variable reference in {expression:?}")]
    Empty { expression: String },

    #[error("invalid variable name {name:?}")]
    InvalidName { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ValidatorError::Cancelled;
        assert_eq!(err.to_string(), "policy validation was cancelled");
        assert!(err.is_cancelled());

        let err: ValidatorError = RegistryError::UnknownValidator {
            kind: "acme".into(),
            validator: "nope".into(),
        }
        .into();
        assert!(err.to_string().contains("unknown validator nope"));
        assert!(!err.is_cancelled());

        let err = PathBuildError::TooManyPaths { limit: 10 };
        assert!(err.to_string().contains("10"));

        let err = VariableSyntaxError::InvalidName { name: "1abc".into() };
        assert!(err.to_string().contains("1abc"));
    }
}
