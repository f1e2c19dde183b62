//! Resolution of per-kind rule behaviors.
//!
//! Lookup order for an assertion:
//!
//! 1. a behavior specialized for its kind name,
//! 2. the named behavior its metadata declares, when registered,
//! 3. the no-op behavior.
//!
//! The result is decorated with the variable-use and variable-set checks when
//! the assertion advertises those capabilities, and cached per kind. Failed
//! lookups are cached too, as the decorated no-op.

use dashmap::DashMap;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::debug;

use policy_types::{
    Assertion, AssertionPath, Capability, Diagnostic, PolicyValidationContext,
    PolicyValidatorResult,
};

use crate::config::ValidatorConfig;
use crate::error::RegistryError;
use crate::resolver::IncludeResolver;
use crate::rules::{
    AuditValidator, CompositeValidator, IdentityValidator, IncludeValidator, NoopValidator,
    PrivateKeyValidator, RegexValidator, RoutingValidator, SamlValidator, SchemaValidator,
    SwaValidator, UnknownAssertionValidator, VariableSetValidator, VariableUseValidator,
    WssVersionValidator, XpathValidator, XslTransformationValidator,
};

/// What a behavior sees while checking one assertion of one path.
pub struct PathScope<'a> {
    pub path: &'a AssertionPath,
    pub context: &'a PolicyValidationContext,
    pub includes: &'a IncludeResolver<'a>,
}

impl<'a> PathScope<'a> {
    pub fn new(
        path: &'a AssertionPath,
        context: &'a PolicyValidationContext,
        includes: &'a IncludeResolver<'a>,
    ) -> Self {
        Self {
            path,
            context,
            includes,
        }
    }

    /// Diagnostic about `assertion`, attributed to this path.
    pub fn diagnostic(&self, assertion: &Arc<Assertion>, message: impl Into<String>) -> Diagnostic {
        Diagnostic::new(assertion.clone(), message).with_path(self.path.id())
    }
}

/// Rule logic for one assertion kind.
///
/// Behaviors are stateless and shared between validation calls; everything
/// they need comes from the assertion and the [`PathScope`].
pub trait AssertionValidator: Send + Sync {
    /// Name used in logs and in configuration bindings.
    fn name(&self) -> &'static str;

    /// Checks run when the engine reaches the assertion.
    fn validate(
        &self,
        assertion: &Arc<Assertion>,
        scope: &PathScope<'_>,
        result: &mut PolicyValidatorResult,
    );

    /// Checks run after the whole path has been walked.
    fn validate_deferred(
        &self,
        _assertion: &Arc<Assertion>,
        _scope: &PathScope<'_>,
        _result: &mut PolicyValidatorResult,
    ) {
    }
}

/// Creates a named behavior.
pub type ValidatorFactory = fn() -> Arc<dyn AssertionValidator>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    kind: Cow<'static, str>,
    validator: Option<Cow<'static, str>>,
    uses_variables: bool,
    sets_variables: bool,
}

impl CacheKey {
    fn for_assertion(assertion: &Assertion) -> Self {
        let meta = assertion.meta();
        Self {
            kind: meta.name.clone(),
            validator: meta.validator.clone(),
            uses_variables: meta.has(Capability::UsesVariables),
            sets_variables: meta.has(Capability::SetsVariables),
        }
    }
}

/// Process-wide table of rule behaviors.
pub struct ValidatorRegistry {
    specialized: HashMap<Cow<'static, str>, Arc<dyn AssertionValidator>>,
    named: HashMap<Cow<'static, str>, ValidatorFactory>,
    cache: DashMap<CacheKey, Arc<dyn AssertionValidator>>,
}

impl ValidatorRegistry {
    pub fn builder() -> ValidatorRegistryBuilder {
        ValidatorRegistryBuilder::new()
    }

    /// Registry with every built-in behavior.
    pub fn with_defaults() -> Self {
        ValidatorRegistryBuilder::with_defaults().build()
    }

    /// Built-in behaviors plus the bindings listed in `config`.
    pub fn from_config(config: &ValidatorConfig) -> Result<Self, RegistryError> {
        Ok(ValidatorRegistryBuilder::with_defaults()
            .apply_config(config)?
            .build())
    }

    /// The decorated behavior for `assertion`.
    pub fn resolve(&self, assertion: &Assertion) -> Arc<dyn AssertionValidator> {
        let key = CacheKey::for_assertion(assertion);
        if let Some(hit) = self.cache.get(&key) {
            return hit.value().clone();
        }

        let behavior = decorate(self.lookup(assertion), assertion);
        self.cache.entry(key).or_insert(behavior).value().clone()
    }

    fn lookup(&self, assertion: &Assertion) -> Arc<dyn AssertionValidator> {
        let meta = assertion.meta();
        if let Some(specialized) = self.specialized.get(&meta.name) {
            return specialized.clone();
        }
        if let Some(name) = &meta.validator {
            match self.named.get(name) {
                Some(factory) => return factory(),
                None => debug!(
                    kind = %meta.name,
                    validator = %name,
                    "declared validator is not registered, using no-op"
                ),
            }
        }
        Arc::new(NoopValidator)
    }

    pub fn is_specialized(&self, kind: &str) -> bool {
        self.specialized.contains_key(kind)
    }

    pub fn named_validators(&self) -> impl Iterator<Item = &str> {
        self.named.keys().map(|k| k.as_ref())
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn decorate(
    base: Arc<dyn AssertionValidator>,
    assertion: &Assertion,
) -> Arc<dyn AssertionValidator> {
    let mut behaviors = vec![base];
    if assertion.has(Capability::UsesVariables) {
        behaviors.push(Arc::new(VariableUseValidator));
    }
    if assertion.has(Capability::SetsVariables) {
        behaviors.push(Arc::new(VariableSetValidator));
    }
    if behaviors.len() == 1 {
        behaviors.remove(0)
    } else {
        Arc::new(CompositeValidator::new(behaviors))
    }
}

/// Builder for [`ValidatorRegistry`].
pub struct ValidatorRegistryBuilder {
    specialized: HashMap<Cow<'static, str>, Arc<dyn AssertionValidator>>,
    named: HashMap<Cow<'static, str>, ValidatorFactory>,
}

const XPATH_KINDS: &[&str] = &[
    "xpath_credentials",
    "request_xpath",
    "response_xpath",
    "require_wss_signed_element",
    "require_wss_encrypted_element",
    "wss_encrypt_element",
];

const IDENTITY_KINDS: &[&str] = &["specific_user", "member_of_group", "authentication"];

const ROUTING_KINDS: &[&str] = &["http_routing", "jms_routing", "echo_routing"];

impl ValidatorRegistryBuilder {
    /// Empty builder: every kind resolves to the no-op behavior.
    pub fn new() -> Self {
        Self {
            specialized: HashMap::new(),
            named: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut builder = Self::new();

        let routing: Arc<dyn AssertionValidator> = Arc::new(RoutingValidator);
        for kind in ROUTING_KINDS {
            builder = builder.specialize(*kind, routing.clone());
        }
        let xpath: Arc<dyn AssertionValidator> = Arc::new(XpathValidator);
        for kind in XPATH_KINDS {
            builder = builder.specialize(*kind, xpath.clone());
        }
        let identity: Arc<dyn AssertionValidator> = Arc::new(IdentityValidator);
        for kind in IDENTITY_KINDS {
            builder = builder.specialize(*kind, identity.clone());
        }

        builder = builder
            .specialize(
                "wss_sign_element",
                Arc::new(CompositeValidator::new(vec![
                    Arc::new(XpathValidator),
                    Arc::new(PrivateKeyValidator),
                ])),
            )
            .specialize("add_wss_security_token", Arc::new(PrivateKeyValidator))
            .specialize("include", Arc::new(IncludeValidator))
            .specialize("regex", Arc::new(RegexValidator))
            .specialize("xsl_transformation", Arc::new(XslTransformationValidator))
            .specialize("schema_validation", Arc::new(SchemaValidator))
            .specialize("audit", Arc::new(AuditValidator))
            .specialize("wss_version", Arc::new(WssVersionValidator))
            .specialize("request_swa", Arc::new(SwaValidator))
            .specialize("require_wss_saml", Arc::new(SamlValidator))
            .specialize("unknown", Arc::new(UnknownAssertionValidator));

        let factories: [(&'static str, ValidatorFactory); 14] = [
            ("noop", || Arc::new(NoopValidator)),
            ("routing", || Arc::new(RoutingValidator)),
            ("include", || Arc::new(IncludeValidator)),
            ("xpath", || Arc::new(XpathValidator)),
            ("private_key", || Arc::new(PrivateKeyValidator)),
            ("regex", || Arc::new(RegexValidator)),
            ("xsl_transformation", || Arc::new(XslTransformationValidator)),
            ("schema", || Arc::new(SchemaValidator)),
            ("audit", || Arc::new(AuditValidator)),
            ("wss_version", || Arc::new(WssVersionValidator)),
            ("swa", || Arc::new(SwaValidator)),
            ("identity", || Arc::new(IdentityValidator)),
            ("saml", || Arc::new(SamlValidator)),
            ("unknown", || Arc::new(UnknownAssertionValidator)),
        ];
        for (name, factory) in factories {
            builder.named.insert(Cow::Borrowed(name), factory);
        }
        builder
    }

    /// Use `validator` for every assertion of kind `kind`.
    pub fn specialize(
        mut self,
        kind: impl Into<Cow<'static, str>>,
        validator: Arc<dyn AssertionValidator>,
    ) -> Self {
        self.specialized.insert(kind.into(), validator);
        self
    }

    /// Make `factory` available under `name` for metadata and bindings.
    pub fn register_named(
        mut self,
        name: impl Into<Cow<'static, str>>,
        factory: ValidatorFactory,
    ) -> Result<Self, RegistryError> {
        let name = name.into();
        if self.named.contains_key(&name) {
            return Err(RegistryError::DuplicateValidator(name.into_owned()));
        }
        self.named.insert(name, factory);
        Ok(self)
    }

    /// Specialize `kind` with the behavior registered under `validator`.
    pub fn bind(self, kind: &str, validator: &str) -> Result<Self, RegistryError> {
        let factory = self
            .named
            .get(validator)
            .copied()
            .ok_or_else(|| RegistryError::UnknownValidator {
                kind: kind.to_string(),
                validator: validator.to_string(),
            })?;
        Ok(self.specialize(kind.to_string(), factory()))
    }

    pub fn apply_config(self, config: &ValidatorConfig) -> Result<Self, RegistryError> {
        config
            .bindings
            .iter()
            .try_fold(self, |builder, binding| builder.bind(&binding.kind, &binding.validator))
    }

    pub fn build(self) -> ValidatorRegistry {
        ValidatorRegistry {
            specialized: self.specialized,
            named: self.named,
            cache: DashMap::new(),
        }
    }
}

impl Default for ValidatorRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: OnceLock<Arc<ValidatorRegistry>> = OnceLock::new();

/// The process-wide registry; the built-in one unless another was installed first.
pub fn global() -> Arc<ValidatorRegistry> {
    GLOBAL
        .get_or_init(|| Arc::new(ValidatorRegistry::with_defaults()))
        .clone()
}

/// Install the process-wide registry. Must run before the first [`global`] call.
pub fn install_global(registry: ValidatorRegistry) -> Result<(), RegistryError> {
    GLOBAL
        .set(Arc::new(registry))
        .map_err(|_| RegistryError::AlreadyInstalled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockFragmentLookup;
    use policy_types::{
        AssertionKind, AssertionMetadata, ExtensionAssertion, PathId, PolicyType,
    };

    fn extension(name: &'static str, validator: Option<&'static str>) -> Arc<Assertion> {
        let mut meta = AssertionMetadata::new(name);
        if let Some(validator) = validator {
            meta = meta.with_validator(validator);
        }
        Assertion::leaf(AssertionKind::Extension(ExtensionAssertion::new(meta)))
    }

    fn run(registry: &ValidatorRegistry, assertion: &Arc<Assertion>) -> PolicyValidatorResult {
        let path = AssertionPath::new(PathId(0), vec![assertion.clone()]);
        let ctx = PolicyValidationContext::new(PolicyType::IncludeFragment);
        let lookup = MockFragmentLookup::new();
        let includes = IncludeResolver::new(&lookup);
        let scope = PathScope::new(&path, &ctx, &includes);
        let mut result = PolicyValidatorResult::new();
        registry.resolve(assertion).validate(assertion, &scope, &mut result);
        result
    }

    #[test]
    fn specialized_behavior_wins() {
        let registry = ValidatorRegistry::with_defaults();
        let unknown = Assertion::leaf(AssertionKind::Unknown {
            name: "Legacy".into(),
            detail: None,
        });
        assert_eq!(registry.resolve(&unknown).name(), "unknown");
        assert_eq!(run(&registry, &unknown).errors().len(), 1);
    }

    #[test]
    fn metadata_named_behavior_is_used() {
        let registry = ValidatorRegistry::with_defaults();
        let ext = extension("acme_unknownish", Some("unknown"));
        assert_eq!(registry.resolve(&ext).name(), "unknown");
    }

    #[test]
    fn missing_named_behavior_falls_back_and_is_cached() {
        let registry = ValidatorRegistry::with_defaults();
        let ext = extension("acme_missing", Some("does_not_exist"));
        assert_eq!(registry.resolve(&ext).name(), "noop");
        assert_eq!(registry.cached_len(), 1);
        let again = registry.resolve(&ext);
        assert_eq!(again.name(), "noop");
        assert_eq!(registry.cached_len(), 1);
        assert!(run(&registry, &ext).is_empty());
    }

    #[test]
    fn variable_capabilities_are_decorated() {
        let registry = ValidatorRegistry::with_defaults();
        let set = Assertion::leaf(AssertionKind::SetVariable {
            name: "request".into(),
            expression: "${undefined.thing}".into(),
        });
        assert_eq!(registry.resolve(&set).name(), "composite");
        let result = run(&registry, &set);
        // shadowing a read-only built-in, and an undefined reference
        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.warnings().len(), 1);
    }

    #[test]
    fn bindings_specialize_kinds() {
        let config = ValidatorConfig::default().with_binding("acme_lookup", "unknown");
        let registry = ValidatorRegistry::from_config(&config).unwrap();
        assert!(registry.is_specialized("acme_lookup"));
        let ext = extension("acme_lookup", None);
        assert_eq!(registry.resolve(&ext).name(), "unknown");
    }

    #[test]
    fn unknown_binding_is_a_startup_error() {
        let config = ValidatorConfig::default().with_binding("acme_lookup", "nope");
        let err = ValidatorRegistry::from_config(&config).err().unwrap();
        assert_eq!(
            err,
            RegistryError::UnknownValidator {
                kind: "acme_lookup".into(),
                validator: "nope".into()
            }
        );
    }

    #[test]
    fn duplicate_named_registration_fails() {
        let err = ValidatorRegistryBuilder::with_defaults()
            .register_named("regex", || Arc::new(NoopValidator))
            .err()
            .unwrap();
        assert_eq!(err, RegistryError::DuplicateValidator("regex".into()));
    }

    #[test]
    fn resolution_is_safe_across_threads() {
        let registry = Arc::new(ValidatorRegistry::with_defaults());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let a = Assertion::leaf(AssertionKind::Regex {
                        pattern: "a+".into(),
                        encoding: None,
                    });
                    registry.resolve(&a).name()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), "regex");
        }
        assert_eq!(registry.cached_len(), 1);
    }
}
