//! Validation diagnostics.

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use crate::assertion::Assertion;
use crate::path::PathId;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// The policy is broken or can never work as configured.
    Error,
    /// The policy is suspicious, redundant or risky.
    Warning,
}

/// Fix an editor can offer for a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemedialAction {
    /// Insert a credential source before the assertion.
    AddCredentialSource,
    /// Add a routing assertion to the policy.
    AddRouting,
    MoveBeforeRouting,
    MoveAfterRouting,
    RemoveAssertion,
    /// Correct the configured URL or endpoint.
    ConfigureEndpoint,
    /// Correct a context variable reference.
    FixVariableReference,
    /// Break an include cycle by removing the include.
    RemoveInclude,
}

/// One finding about one assertion.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub assertion: Arc<Assertion>,
    pub path: Option<PathId>,
    pub message: String,
    pub cause: Option<Arc<dyn StdError + Send + Sync>>,
    pub remedy: Option<RemedialAction>,
}

impl Diagnostic {
    pub fn new(assertion: Arc<Assertion>, message: impl Into<String>) -> Self {
        Self {
            assertion,
            path: None,
            message: message.into(),
            cause: None,
            remedy: None,
        }
    }

    pub fn with_path(mut self, path: PathId) -> Self {
        self.path = Some(path);
        self
    }

    pub fn with_cause(mut self, cause: impl StdError + Send + Sync + 'static) -> Self {
        self.cause = Some(Arc::new(cause));
        self
    }

    pub fn with_remedy(mut self, remedy: RemedialAction) -> Self {
        self.remedy = Some(remedy);
        self
    }

    /// Whether this diagnostic is about `assertion` (by identity).
    pub fn concerns(&self, assertion: &Arc<Assertion>) -> bool {
        Arc::ptr_eq(&self.assertion, assertion)
    }
}

impl PartialEq for Diagnostic {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.assertion, &other.assertion)
            && self.path == other.path
            && self.message == other.message
            && self.remedy == other.remedy
            && self.cause.as_ref().map(|c| c.to_string())
                == other.cause.as_ref().map(|c| c.to_string())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.assertion, self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, " ({cause})")?;
        }
        Ok(())
    }
}

/// Errors and warnings collected for one validation call, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyValidatorResult {
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

impl PolicyValidatorResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, diagnostic: Diagnostic) {
        self.errors.push(diagnostic);
    }

    pub fn add_warning(&mut self, diagnostic: Diagnostic) {
        self.warnings.push(diagnostic);
    }

    pub fn add(&mut self, severity: Severity, diagnostic: Diagnostic) {
        match severity {
            Severity::Error => self.add_error(diagnostic),
            Severity::Warning => self.add_warning(diagnostic),
        }
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    /// Appends `other`, keeping its order. Duplicates are kept.
    pub fn merge(&mut self, other: PolicyValidatorResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// All diagnostics, errors first.
    pub fn iter(&self) -> impl Iterator<Item = (Severity, &Diagnostic)> {
        self.errors
            .iter()
            .map(|d| (Severity::Error, d))
            .chain(self.warnings.iter().map(|d| (Severity::Warning, d)))
    }

    pub fn errors_for<'a>(
        &'a self,
        assertion: &'a Arc<Assertion>,
    ) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.errors.iter().filter(move |d| d.concerns(assertion))
    }

    pub fn warnings_for<'a>(
        &'a self,
        assertion: &'a Arc<Assertion>,
    ) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.warnings.iter().filter(move |d| d.concerns(assertion))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::AssertionKind;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("boom")
        }
    }

    impl StdError for Boom {}

    #[test]
    fn merge_keeps_order_and_duplicates() {
        let a = Assertion::leaf(AssertionKind::HttpBasic);
        let mut first = PolicyValidatorResult::new();
        first.add_warning(Diagnostic::new(a.clone(), "one"));
        let mut second = PolicyValidatorResult::new();
        second.add_warning(Diagnostic::new(a.clone(), "one"));
        second.add_error(Diagnostic::new(a.clone(), "two"));

        first.merge(second);
        assert_eq!(first.warnings().len(), 2);
        assert_eq!(first.errors().len(), 1);
        assert_eq!(first.iter().next().unwrap().0, Severity::Error);
    }

    #[test]
    fn equality_uses_assertion_identity() {
        let a = Assertion::leaf(AssertionKind::HttpBasic);
        let b = Assertion::leaf(AssertionKind::HttpBasic);
        assert_eq!(Diagnostic::new(a.clone(), "m"), Diagnostic::new(a.clone(), "m"));
        assert_ne!(Diagnostic::new(a, "m"), Diagnostic::new(b, "m"));
    }

    #[test]
    fn display_includes_cause() {
        let a = Assertion::leaf(AssertionKind::HttpBasic);
        let d = Diagnostic::new(a, "bad").with_cause(Boom);
        assert_eq!(d.to_string(), "http_basic: bad (boom)");
    }

    #[test]
    fn filters_by_assertion() {
        let a = Assertion::leaf(AssertionKind::HttpBasic);
        let b = Assertion::leaf(AssertionKind::EchoRouting);
        let mut result = PolicyValidatorResult::new();
        result.add(Severity::Error, Diagnostic::new(a.clone(), "x"));
        result.add(Severity::Warning, Diagnostic::new(b.clone(), "y"));
        assert_eq!(result.errors_for(&a).count(), 1);
        assert_eq!(result.errors_for(&b).count(), 0);
        assert_eq!(result.warnings_for(&b).count(), 1);
    }
}
