//! Validator configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::error::ConfigError;

/// Binds an assertion kind to a named validator behavior at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorBinding {
    pub kind: String,
    pub validator: String,
}

/// Tunables for a [`PolicyValidator`](crate::PolicyValidator).
///
/// ```toml
/// permitted_kinds = ["http_basic", "specific_user", "http_routing"]
/// loop_sensitive_tags = ["debug-trace", "audit-sink"]
/// summary_warnings = true
///
/// [[bindings]]
/// kind = "acme_lookup"
/// validator = "xpath"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Extra kind-to-behavior bindings applied when the registry is built.
    pub bindings: Vec<ValidatorBinding>,
    /// When set, other assertion kinds are reported as not permitted.
    pub permitted_kinds: Option<BTreeSet<String>>,
    /// Internal policy tags whose routing would feed back into themselves.
    pub loop_sensitive_tags: Vec<String>,
    /// Whole-path warnings for service policies (missing routing and so on).
    pub summary_warnings: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            bindings: Vec::new(),
            permitted_kinds: None,
            loop_sensitive_tags: vec!["debug-trace".to_string(), "audit-sink".to_string()],
            summary_warnings: true,
        }
    }
}

impl ValidatorConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Self::from_toml_str(&contents)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn with_binding(mut self, kind: impl Into<String>, validator: impl Into<String>) -> Self {
        self.bindings.push(ValidatorBinding {
            kind: kind.into(),
            validator: validator.into(),
        });
        self
    }

    pub fn with_permitted_kinds<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permitted_kinds = Some(kinds.into_iter().map(Into::into).collect());
        self
    }

    pub fn without_summary_warnings(mut self) -> Self {
        self.summary_warnings = false;
        self
    }

    pub fn is_permitted(&self, kind: &str) -> bool {
        self.permitted_kinds
            .as_ref()
            .map_or(true, |kinds| kinds.contains(kind))
    }

    pub fn is_loop_sensitive(&self, tag: &str) -> bool {
        self.loop_sensitive_tags.iter().any(|t| t == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = ValidatorConfig::default();
        assert!(config.summary_warnings);
        assert!(config.is_permitted("anything"));
        assert!(config.is_loop_sensitive("debug-trace"));
        assert!(!config.is_loop_sensitive("other"));
    }

    #[test]
    fn parses_partial_toml() {
        let config = ValidatorConfig::from_toml_str(
            r#"
            permitted_kinds = ["http_basic", "http_routing"]

            [[bindings]]
            kind = "acme_lookup"
            validator = "xpath"
            "#,
        )
        .unwrap();
        assert!(config.is_permitted("http_basic"));
        assert!(!config.is_permitted("regex"));
        assert_eq!(config.bindings.len(), 1);
        assert_eq!(config.bindings[0].validator, "xpath");
        assert_eq!(config.loop_sensitive_tags.len(), 2);
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let err = ValidatorConfig::from_toml_str("summary_warnings = \"yes\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn loads_from_file_or_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "summary_warnings = false").unwrap();
        let config = ValidatorConfig::load(file.path()).unwrap();
        assert!(!config.summary_warnings);

        let dir = tempfile::tempdir().unwrap();
        let config = ValidatorConfig::load(dir.path().join("missing.toml")).unwrap();
        assert_eq!(config, ValidatorConfig::default());
    }
}
