//! Static validation of gateway policies.
//!
//! A policy tree is expanded into its OR-resolved paths and each path is
//! walked in execution order. Every assertion visited gets:
//!
//! - the validator behavior its kind resolves to in the [`ValidatorRegistry`]
//! - license and permitted-kind checks
//! - ordering checks against what the path has already done (credentials
//!   before access control, security before routing, per actor and target)
//!
//! Circular includes are reported before any path is built. Findings are
//! [`Diagnostic`](policy_types::Diagnostic)s in a
//! [`PolicyValidatorResult`](policy_types::PolicyValidatorResult); a
//! [`ValidatorError`] only ends a call early (cancellation, registry setup).
//!
//! ## Usage
//!
//! ```ignore
//! let validator = PolicyValidator::new(path_builder, fragments);
//! let result = validator.validate(&root, &PolicyValidationContext::soap_service(), &license)?;
//! for diagnostic in result.errors() {
//!     println!("{}: {}", diagnostic.assertion.name(), diagnostic.message);
//! }
//! ```

#![deny(unsafe_code)]

pub mod cancel;
pub mod circular;
pub mod config;
pub mod error;
pub mod messages;
pub mod mocks;
pub mod path_validator;
pub mod registry;
pub mod resolver;
pub mod rules;
pub mod state;
pub mod traits;
pub mod validator;
pub mod variables;

pub use cancel::CancelHandle;
pub use config::{ValidatorBinding, ValidatorConfig};
pub use error::{
    ConfigError, FragmentError, LookupError, PathBuildError, RegistryError, ValidatorError,
    VariableSyntaxError,
};
pub use mocks::{MockFragmentLookup, MockLicenseOracle, MockPathBuilder, MockWsdl};
pub use path_validator::PathValidator;
pub use registry::{
    global, install_global, AssertionValidator, PathScope, ValidatorFactory, ValidatorRegistry,
    ValidatorRegistryBuilder,
};
pub use resolver::IncludeResolver;
pub use traits::{LicenseOracle, PathBuilder, PolicyFragmentLookup};
pub use validator::PolicyValidator;
