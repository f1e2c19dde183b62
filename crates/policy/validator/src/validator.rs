//! Tree validation: circular include check, path expansion, per-path engine.

use std::sync::Arc;

use policy_types::{
    Assertion, Diagnostic, PolicyGuid, PolicyHeader, PolicyType, PolicyValidationContext,
    PolicyValidatorResult, RemedialAction,
};
use tracing::{debug, info};

use crate::cancel::CancelHandle;
use crate::circular;
use crate::config::ValidatorConfig;
use crate::error::{RegistryError, ValidatorError};
use crate::messages;
use crate::path_validator::PathValidator;
use crate::registry::{self, ValidatorRegistry};
use crate::resolver::IncludeResolver;
use crate::traits::{LicenseOracle, PathBuilder, PolicyFragmentLookup};

/// Validates whole policy trees.
///
/// Each call gets its own include resolver, dropped on every exit path.
/// The registry is the only state shared between calls.
pub struct PolicyValidator {
    registry: Arc<ValidatorRegistry>,
    path_builder: Arc<dyn PathBuilder>,
    fragments: Arc<dyn PolicyFragmentLookup>,
    config: ValidatorConfig,
}

impl PolicyValidator {
    /// Validator using the process-wide registry and default configuration.
    pub fn new(
        path_builder: Arc<dyn PathBuilder>,
        fragments: Arc<dyn PolicyFragmentLookup>,
    ) -> Self {
        Self {
            registry: registry::global(),
            path_builder,
            fragments,
            config: ValidatorConfig::default(),
        }
    }

    /// Validator with its own registry built from `config`.
    pub fn from_config(
        path_builder: Arc<dyn PathBuilder>,
        fragments: Arc<dyn PolicyFragmentLookup>,
        config: ValidatorConfig,
    ) -> Result<Self, RegistryError> {
        let registry = Arc::new(ValidatorRegistry::from_config(&config)?);
        Ok(Self {
            registry,
            path_builder,
            fragments,
            config,
        })
    }

    pub fn with_registry(mut self, registry: Arc<ValidatorRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_config(mut self, config: ValidatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ValidatorRegistry> {
        &self.registry
    }

    pub fn validate(
        &self,
        root: &Arc<Assertion>,
        context: &PolicyValidationContext,
        license: &dyn LicenseOracle,
    ) -> Result<PolicyValidatorResult, ValidatorError> {
        self.validate_cancellable(root, context, license, &CancelHandle::new())
    }

    /// Like [`validate`](Self::validate), aborting with
    /// [`ValidatorError::Cancelled`] once `cancel` fires.
    pub fn validate_cancellable(
        &self,
        root: &Arc<Assertion>,
        context: &PolicyValidationContext,
        license: &dyn LicenseOracle,
        cancel: &CancelHandle,
    ) -> Result<PolicyValidatorResult, ValidatorError> {
        cancel.check()?;
        let includes = IncludeResolver::new(self.fragments.as_ref());
        let mut result = PolicyValidatorResult::new();

        let header = context
            .policy
            .clone()
            .unwrap_or_else(|| PolicyHeader::unsaved("policy", context.policy_type));
        let cycles = circular::detect(&includes, &header, root);
        if !cycles.is_empty() {
            info!(
                policy = %header,
                cycles = cycles.len(),
                "circular includes, skipping path validation"
            );
            for diagnostic in cycles {
                result.add_error(diagnostic);
            }
            return Ok(result);
        }

        let fragment_errors = self.path_builder.preflight_includes(root, &includes);
        if !fragment_errors.is_empty() {
            info!(policy = %header, errors = fragment_errors.len(), "include preflight failed");
            for error in fragment_errors {
                result.add_error(
                    Diagnostic::new(error.include.clone(), error.to_string())
                        .with_remedy(RemedialAction::RemoveInclude),
                );
            }
            return Ok(result);
        }

        let paths = match self.path_builder.generate(root, &includes) {
            Ok(paths) => paths,
            Err(e) => {
                info!(policy = %header, error = %e, "path expansion failed");
                result.add_error(
                    Diagnostic::new(root.clone(), messages::PATH_BUILD_FAILED).with_cause(e),
                );
                return Ok(result);
            }
        };
        debug!(policy = %header, paths = paths.len(), "policy expanded");

        for path in &paths {
            cancel.check()?;
            let path_result = PathValidator::new(path, context, &self.registry, license, &includes)
                .with_config(&self.config)
                .with_cancel(cancel)
                .validate()?;
            result.merge(path_result);
        }

        info!(
            policy = %header,
            paths = paths.len(),
            errors = result.errors().len(),
            warnings = result.warnings().len(),
            fragments = includes.resolved_count(),
            "policy validated"
        );
        Ok(result)
    }

    /// Circular include errors for the policy `guid`/`name` rooted at `root`.
    pub fn check_circular_includes(
        &self,
        guid: PolicyGuid,
        name: &str,
        root: &Arc<Assertion>,
    ) -> Vec<Diagnostic> {
        let includes = IncludeResolver::new(self.fragments.as_ref());
        let header = PolicyHeader::new(guid, name, PolicyType::default());
        circular::detect(&includes, &header, root)
    }
}
