//! Built-in rule behaviors, one per assertion family.

mod content;
mod identity;
mod include;
mod routing;
mod variables;
mod wss;
mod xpath;

use std::sync::Arc;

use policy_types::{Assertion, PolicyValidatorResult};

use crate::registry::{AssertionValidator, PathScope};

pub use content::{
    AuditValidator, RegexValidator, SchemaValidator, UnknownAssertionValidator,
    XslTransformationValidator,
};
pub use identity::{IdentityValidator, PrivateKeyValidator, SamlValidator};
pub use include::IncludeValidator;
pub use routing::RoutingValidator;
pub use variables::{VariableSetValidator, VariableUseValidator};
pub use wss::{SwaValidator, WssVersionValidator};
pub use xpath::XpathValidator;

/// Behavior for kinds with no rules of their own.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopValidator;

impl AssertionValidator for NoopValidator {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn validate(&self, _: &Arc<Assertion>, _: &PathScope<'_>, _: &mut PolicyValidatorResult) {}
}

/// Runs several behaviors in order, merging their diagnostics.
pub struct CompositeValidator {
    behaviors: Vec<Arc<dyn AssertionValidator>>,
}

impl CompositeValidator {
    pub fn new(behaviors: Vec<Arc<dyn AssertionValidator>>) -> Self {
        Self { behaviors }
    }
}

impl AssertionValidator for CompositeValidator {
    fn name(&self) -> &'static str {
        "composite"
    }

    fn validate(
        &self,
        assertion: &Arc<Assertion>,
        scope: &PathScope<'_>,
        result: &mut PolicyValidatorResult,
    ) {
        for behavior in &self.behaviors {
            behavior.validate(assertion, scope, result);
        }
    }

    fn validate_deferred(
        &self,
        assertion: &Arc<Assertion>,
        scope: &PathScope<'_>,
        result: &mut PolicyValidatorResult,
    ) {
        for behavior in &self.behaviors {
            behavior.validate_deferred(assertion, scope, result);
        }
    }
}
