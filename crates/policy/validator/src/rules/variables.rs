use std::collections::BTreeSet;
use std::sync::Arc;

use policy_types::{Assertion, PolicyValidatorResult, RemedialAction};

use crate::messages;
use crate::registry::{AssertionValidator, PathScope};
use crate::variables::{find_builtin, referenced_names, refers_to, validate_name};

/// Every `${name}` an assertion reads is built in or set earlier in the path.
#[derive(Debug, Clone, Copy, Default)]
pub struct VariableUseValidator;

impl AssertionValidator for VariableUseValidator {
    fn name(&self) -> &'static str {
        "variable_use"
    }

    fn validate(
        &self,
        assertion: &Arc<Assertion>,
        scope: &PathScope<'_>,
        result: &mut PolicyValidatorResult,
    ) {
        let mut reported = BTreeSet::new();
        for expression in assertion.variables_used() {
            let names = match referenced_names(&expression) {
                Ok(names) => names,
                Err(e) => {
                    result.add_error(
                        scope
                            .diagnostic(assertion, messages::VARIABLE_SYNTAX)
                            .with_cause(e)
                            .with_remedy(RemedialAction::FixVariableReference),
                    );
                    continue;
                }
            };

            for name in names {
                if !reported.insert(name.to_lowercase()) {
                    continue;
                }
                if let Some(builtin) = find_builtin(&name) {
                    if let Some(replacement) = builtin.replacement {
                        let message = messages::variable_deprecated(&name, replacement);
                        result.add_warning(
                            scope
                                .diagnostic(assertion, message)
                                .with_remedy(RemedialAction::FixVariableReference),
                        );
                    }
                    continue;
                }
                let set_earlier = scope
                    .path
                    .predecessors(assertion)
                    .flat_map(|a| a.variables_set())
                    .any(|declared| refers_to(&name, &declared));
                if !set_earlier {
                    result.add_warning(
                        scope
                            .diagnostic(assertion, messages::variable_undefined(&name))
                            .with_remedy(RemedialAction::FixVariableReference),
                    );
                }
            }
        }
    }
}

/// Variables an assertion sets are well named and don't overwrite
/// read-only built-ins.
#[derive(Debug, Clone, Copy, Default)]
pub struct VariableSetValidator;

impl AssertionValidator for VariableSetValidator {
    fn name(&self) -> &'static str {
        "variable_set"
    }

    fn validate(
        &self,
        assertion: &Arc<Assertion>,
        scope: &PathScope<'_>,
        result: &mut PolicyValidatorResult,
    ) {
        for variable in assertion.variables_set() {
            if let Err(e) = validate_name(&variable.name) {
                result.add_error(
                    scope
                        .diagnostic(assertion, messages::variable_invalid_name(&variable.name))
                        .with_cause(e),
                );
                continue;
            }
            if find_builtin(&variable.name).is_some_and(|b| !b.settable) {
                result.add_error(
                    scope
                        .diagnostic(assertion, messages::variable_not_settable(&variable.name))
                        .with_remedy(RemedialAction::FixVariableReference),
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
    use policy_types::{AssertionKind, PolicyType, PolicyValidationContext};

    fn set(name: &str, expression: &str) -> Arc<Assertion> {
        Assertion::leaf(AssertionKind::SetVariable {
            name: name.into(),
            expression: expression.into(),
        })
    }

    fn uses(path: Vec<Arc<Assertion>>, target: &Arc<Assertion>) -> PolicyValidatorResult {
        run_on(
            &VariableUseValidator,
            path,
            target,
            &PolicyValidationContext::new(PolicyType::IncludeFragment),
            &MockFragmentLookup::new(),
        )
    }

    #[test]
    fn builtins_and_earlier_variables_resolve() {
        let greeting = set("greeting", "hello ${request.username}");
        let reply = set("reply", "${Greeting} from ${gateway.hostname}");
        let result = uses(vec![greeting, reply.clone()], &reply);
        assert!(result.is_empty(), "{result:?}");
    }

    #[test]
    fn later_variables_do_not_resolve() {
        let reply = set("reply", "${greeting}");
        let greeting = set("greeting", "hi");
        let result = uses(vec![reply.clone(), greeting], &reply);
        assert_eq!(result.warnings().len(), 1);
        assert_eq!(result.warnings()[0].message, messages::variable_undefined("greeting"));
    }

    #[test]
    fn repeated_reference_reported_once() {
        let reply = set("reply", "${missing}${MISSING}");
        assert_eq!(run_alone(&VariableUseValidator, &reply).warnings().len(), 1);
    }

    #[test]
    fn deprecated_builtin_warns() {
        let a = set("ip", "${request.tcp.remoteip}");
        let result = run_alone(&VariableUseValidator, &a);
        assert_eq!(
            result.warnings()[0].message,
            messages::variable_deprecated("request.tcp.remoteip", "request.tcp.remoteAddress")
        );
    }

    #[test]
    fn malformed_syntax_is_an_error_and_walk_continues() {
        let a = Assertion::builder(AssertionKind::SetVariable {
            name: "x".into(),
            expression: "${unterminated".into(),
        })
        .uses_variable("${alsoMissing}")
        .build()
        .unwrap();
        let result = run_alone(&VariableUseValidator, &a);
        assert_eq!(result.errors().len(), 1);
        assert!(result.errors()[0].cause.is_some());
        assert_eq!(result.warnings().len(), 1);
    }

    #[test]
    fn set_checks() {
        assert!(run_alone(&VariableSetValidator, &set("mine", "1")).is_empty());
        assert!(run_alone(&VariableSetValidator, &set("auditLevel", "INFO")).is_empty());

        let result = run_alone(&VariableSetValidator, &set("request.username", "bob"));
        assert_eq!(result.errors()[0].message, messages::variable_not_settable("request.username"));

        let result = run_alone(&VariableSetValidator, &set("9lives", "1"));
        assert_eq!(result.errors()[0].message, messages::variable_invalid_name("9lives"));
    }
}
