use regex::Regex;
use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};

use policy_types::{Assertion, NamespaceMap, PolicyValidatorResult, SoapVersion};

use crate::messages;
use crate::registry::{AssertionValidator, PathScope};

/// String literals and `${...}` references; prefixes inside them don't count.
static OPAQUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"'[^']*'|"[^"]*"|\$\{[^}]*\}"#).expect("xpath literal pattern")
});

/// `prefix:name` or `prefix:*`. `axis::` never matches since the character
/// after the colon must start a name.
static PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^A-Za-z0-9_.\-:$])([A-Za-z_][A-Za-z0-9_.\-]*):[A-Za-z_*]")
        .expect("xpath prefix pattern")
});

/// Prefixes bound in every XPath context.
const IMPLICIT_PREFIXES: &[&str] = &["xml"];

/// Namespace prefixes used in `expression`, in first-use order.
pub(crate) fn prefixes(expression: &str) -> Vec<String> {
    let stripped = OPAQUE_RE.replace_all(expression, " ");
    let mut seen = BTreeSet::new();
    PREFIX_RE
        .captures_iter(&stripped)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

/// XPath expressions and their namespace bindings.
#[derive(Debug, Clone, Copy, Default)]
pub struct XpathValidator;

impl AssertionValidator for XpathValidator {
    fn name(&self) -> &'static str {
        "xpath"
    }

    fn validate(
        &self,
        assertion: &Arc<Assertion>,
        scope: &PathScope<'_>,
        result: &mut PolicyValidatorResult,
    ) {
        let Some(expression) = assertion.kind().xpath_expression() else {
            return;
        };
        if expression.trim().is_empty() {
            result.add_error(scope.diagnostic(assertion, messages::XPATH_EMPTY));
            return;
        }

        let empty = NamespaceMap::new();
        let namespaces = assertion
            .namespaces()
            .or_else(|| assertion.kind().namespaces())
            .unwrap_or(&empty);

        for prefix in prefixes(expression) {
            if !namespaces.contains_prefix(&prefix)
                && !IMPLICIT_PREFIXES.contains(&prefix.as_str())
            {
                result.add_error(scope.diagnostic(assertion, messages::undeclared_prefix(&prefix)));
            }
        }

        if let Some(service) = scope.context.soap_version {
            let contradicting = namespaces
                .uris()
                .filter_map(SoapVersion::for_envelope_namespace)
                .find(|bound| *bound != service);
            if let Some(bound) = contradicting {
                result.add_warning(
                    scope.diagnostic(assertion, messages::soap_version_mismatch(bound, service)),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockFragmentLookup;
    use crate::rules::testing::{run_alone, run_on};
    use policy_types::{
        AssertionKind, PolicyType, PolicyValidationContext, SOAP_1_1_ENVELOPE_NS,
        SOAP_1_2_ENVELOPE_NS,
    };

    fn request_xpath(expression: &str, namespaces: NamespaceMap) -> Arc<Assertion> {
        Assertion::leaf(AssertionKind::RequestXpath {
            expression: expression.into(),
            namespaces,
        })
    }

    #[test]
    fn finds_prefixes() {
        assert_eq!(prefixes("/s:Envelope/s:Body/ns1:op"), vec!["s", "ns1"]);
        assert_eq!(prefixes("child::a/descendant::b"), Vec::<String>::new());
        assert_eq!(prefixes("//x:*"), vec!["x"]);
        assert_eq!(prefixes("/a[@b='p:q']"), Vec::<String>::new());
        assert_eq!(prefixes("/a[. = ${request.http.header.x:y}]"), Vec::<String>::new());
    }

    #[test]
    fn declared_prefixes_are_clean() {
        let ns = NamespaceMap::new().with("s", SOAP_1_1_ENVELOPE_NS);
        assert!(run_alone(&XpathValidator, &request_xpath("/s:Envelope/s:Body", ns)).is_empty());
    }

    #[test]
    fn empty_expression_is_an_error() {
        let result = run_alone(&XpathValidator, &request_xpath("  ", NamespaceMap::new()));
        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].message, messages::XPATH_EMPTY);
    }

    #[test]
    fn undeclared_prefix_reported_once() {
        let result = run_alone(
            &XpathValidator,
            &request_xpath("/soap:Envelope/soap:Body", NamespaceMap::new()),
        );
        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].message, messages::undeclared_prefix("soap"));
    }

    #[test]
    fn contradicting_soap_version_warns() {
        let ns = NamespaceMap::new().with("s", SOAP_1_2_ENVELOPE_NS);
        let xpath = request_xpath("/s:Envelope", ns);
        let ctx = PolicyValidationContext::new(PolicyType::IncludeFragment)
            .with_soap_version(SoapVersion::Soap11);
        let result = run_on(
            &XpathValidator,
            vec![xpath.clone()],
            &xpath,
            &ctx,
            &MockFragmentLookup::new(),
        );
        assert!(!result.has_errors());
        assert_eq!(
            result.warnings()[0].message,
            messages::soap_version_mismatch(SoapVersion::Soap12, SoapVersion::Soap11)
        );
    }
}
