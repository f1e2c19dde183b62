use regex::Regex;
use std::sync::Arc;

use policy_types::{
    Assertion, AssertionKind, PolicyValidatorResult, RemedialAction, StylesheetSource,
};

use crate::messages;
use crate::registry::{AssertionValidator, PathScope};

/// Character encodings the gateway can decode message bodies with.
const SUPPORTED_ENCODINGS: &[&str] = &[
    "utf-8",
    "utf8",
    "utf-16",
    "utf-16le",
    "utf-16be",
    "us-ascii",
    "ascii",
    "iso-8859-1",
    "latin1",
    "iso-8859-15",
    "windows-1252",
    "shift_jis",
    "euc-jp",
    "gb2312",
    "big5",
];

/// Regular expression patterns compile and name a known encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexValidator;

impl AssertionValidator for RegexValidator {
    fn name(&self) -> &'static str {
        "regex"
    }

    fn validate(
        &self,
        assertion: &Arc<Assertion>,
        scope: &PathScope<'_>,
        result: &mut PolicyValidatorResult,
    ) {
        let AssertionKind::Regex { pattern, encoding } = assertion.kind() else {
            return;
        };
        if let Err(e) = Regex::new(pattern) {
            result.add_error(
                scope
                    .diagnostic(assertion, messages::REGEX_INVALID)
                    .with_cause(e),
            );
        }
        if let Some(encoding) = encoding.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            let known = SUPPORTED_ENCODINGS
                .iter()
                .any(|s| s.eq_ignore_ascii_case(encoding));
            if !known {
                let message = messages::unsupported_encoding(encoding);
                result.add_warning(scope.diagnostic(assertion, message));
            }
        }
    }
}

/// Stylesheets taken from the message rarely exist in SOAP traffic.
#[derive(Debug, Clone, Copy, Default)]
pub struct XslTransformationValidator;

impl AssertionValidator for XslTransformationValidator {
    fn name(&self) -> &'static str {
        "xsl_transformation"
    }

    fn validate(
        &self,
        assertion: &Arc<Assertion>,
        scope: &PathScope<'_>,
        result: &mut PolicyValidatorResult,
    ) {
        if let AssertionKind::XslTransformation {
            source: StylesheetSource::MessageUrl,
        } = assertion.kind()
        {
            if scope.context.soap {
                result.add_warning(scope.diagnostic(assertion, messages::XSLT_MESSAGE_URL));
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaValidator;

impl AssertionValidator for SchemaValidator {
    fn name(&self) -> &'static str {
        "schema"
    }

    fn validate(
        &self,
        assertion: &Arc<Assertion>,
        scope: &PathScope<'_>,
        result: &mut PolicyValidatorResult,
    ) {
        if let AssertionKind::SchemaValidation { schema } = assertion.kind() {
            if schema.trim().is_empty() {
                result.add_error(scope.diagnostic(assertion, messages::SCHEMA_EMPTY));
            }
        }
    }
}

/// Saving message bodies with audit records.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditValidator;

impl AssertionValidator for AuditValidator {
    fn name(&self) -> &'static str {
        "audit"
    }

    fn validate(
        &self,
        assertion: &Arc<Assertion>,
        scope: &PathScope<'_>,
        result: &mut PolicyValidatorResult,
    ) {
        if let AssertionKind::Audit {
            save_request,
            save_response,
        } = assertion.kind()
        {
            if *save_request || *save_response {
                result.add_warning(scope.diagnostic(assertion, messages::AUDIT_DISK_USAGE));
            }
        }
    }
}

/// Assertions the gateway could not recognize fail every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnknownAssertionValidator;

impl AssertionValidator for UnknownAssertionValidator {
    fn name(&self) -> &'static str {
        "unknown"
    }

    fn validate(
        &self,
        assertion: &Arc<Assertion>,
        scope: &PathScope<'_>,
        result: &mut PolicyValidatorResult,
    ) {
        let (name, detail) = match assertion.kind() {
            AssertionKind::Unknown { name, detail } => (name.as_str(), detail.as_deref()),
            _ => (assertion.meta().name.as_ref(), None),
        };
        let message = match detail {
            Some(detail) => format!("{} {detail}", messages::unknown_assertion(name)),
            None => messages::unknown_assertion(name),
        };
        result.add_error(
            scope
                .diagnostic(assertion, message)
                .with_remedy(RemedialAction::RemoveAssertion),
        );
    }
}
