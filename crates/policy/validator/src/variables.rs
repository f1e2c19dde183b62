//! Context variable references: `${name}` syntax and the built-in variable table.
//!
//! Names match case-insensitively. A reference `a.b` resolves to a variable
//! `a` through a selector suffix, and `a[2]` to the multivalued variable `a`.

use regex::Regex;
use std::sync::LazyLock;

use policy_types::VariableMetadata;

use crate::error::VariableSyntaxError;

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_.:\-]*(\[[0-9]+\][A-Za-z0-9_.:\-]*)*$")
        .expect("variable name pattern")
});

static INDEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[0-9]+\]").expect("variable index pattern"));

/// One variable the gateway defines for every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinVariable {
    pub name: &'static str,
    /// `name.<suffix>` references resolve here.
    pub prefixed: bool,
    pub settable: bool,
    /// Preferred name when this one is deprecated.
    pub replacement: Option<&'static str>,
}

const fn builtin(name: &'static str, prefixed: bool, settable: bool) -> BuiltinVariable {
    BuiltinVariable {
        name,
        prefixed,
        settable,
        replacement: None,
    }
}

const fn deprecated(name: &'static str, replacement: &'static str) -> BuiltinVariable {
    BuiltinVariable {
        name,
        prefixed: false,
        settable: false,
        replacement: Some(replacement),
    }
}

static BUILTINS: &[BuiltinVariable] = &[
    builtin("request", true, false),
    builtin("response", true, false),
    builtin("request.http.header", true, false),
    builtin("request.http.parameter", true, false),
    builtin("request.username", false, false),
    builtin("request.password", false, false),
    builtin("request.clientid", false, false),
    builtin("request.authenticateduser", true, false),
    builtin("request.authenticateddn", true, false),
    builtin("request.tcp.remoteAddress", false, false),
    builtin("request.tcp.remoteHost", false, false),
    builtin("request.tcp.localPort", false, false),
    builtin("request.url", true, false),
    builtin("request.soap.operation", false, false),
    builtin("request.soap.namespace", false, false),
    builtin("response.http.status", false, false),
    builtin("service.name", false, false),
    builtin("service.goid", false, false),
    builtin("service.url", true, false),
    builtin("policy.name", false, false),
    builtin("policy.guid", false, false),
    builtin("gateway.time", true, false),
    builtin("gateway.hostname", false, false),
    builtin("requestId", false, false),
    builtin("auditLevel", false, true),
    builtin("audit.details", true, true),
    deprecated("request.tcp.remoteip", "request.tcp.remoteAddress"),
    deprecated("request.http.uri", "request.url.path"),
    deprecated("service.oid", "service.goid"),
];

/// All built-in variables.
pub fn builtins() -> &'static [BuiltinVariable] {
    BUILTINS
}

/// Lower-cased reference with array indexes removed.
pub fn normalize(reference: &str) -> String {
    INDEX_RE.replace_all(reference, "").to_lowercase()
}

fn resolves_to(normalized: &str, name: &str, prefixed: bool) -> bool {
    let name = name.to_lowercase();
    normalized == name
        || (prefixed
            && normalized.len() > name.len()
            && normalized.starts_with(&name)
            && normalized.as_bytes()[name.len()] == b'.')
}

/// The most specific built-in a reference resolves to.
pub fn find_builtin(reference: &str) -> Option<&'static BuiltinVariable> {
    let normalized = normalize(reference);
    BUILTINS
        .iter()
        .filter(|b| resolves_to(&normalized, b.name, b.prefixed))
        .max_by_key(|b| b.name.len())
}

/// Whether a reference resolves to a variable declared by an assertion.
/// Selector suffixes are allowed on every declared variable.
pub fn refers_to(reference: &str, declared: &VariableMetadata) -> bool {
    resolves_to(&normalize(reference), &declared.name, true)
}

pub fn validate_name(name: &str) -> Result<(), VariableSyntaxError> {
    if NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(VariableSyntaxError::InvalidName {
            name: name.to_string(),
        })
    }
}

/// Names referenced as `${name}` in `expression`, in order of appearance.
pub fn referenced_names(expression: &str) -> Result<Vec<String>, VariableSyntaxError> {
    let mut names = Vec::new();
    let mut pos = 0;
    while let Some(found) = expression[pos..].find("${") {
        let open = pos + found;
        let start = open + 2;
        let Some(len) = expression[start..].find('}') else {
            return Err(VariableSyntaxError::Unterminated {
                expression: expression.to_string(),
                offset: open,
            });
        };
        let name = expression[start..start + len].trim();
        if name.is_empty() {
            return Err(VariableSyntaxError::Empty {
                expression: expression.to_string(),
            });
        }
        validate_name(name)?;
        names.push(name.to_string());
        pos = start + len + 1;
    }
    Ok(names)
}
