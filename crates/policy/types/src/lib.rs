//! Policy model for gateway security and routing policies.
//!
//! A policy is a tree of [`Assertion`]s. Composite assertions (`All`,
//! `OneOrMore`) combine children; every other kind is a leaf whose behavior
//! is described by the [`Capability`] set and [`AssertionMetadata`] it
//! advertises. The validator consumes these types read-only:
//!
//! - [`AssertionPath`]: one OR-resolved branch of a tree, in execution order
//! - [`PolicyValidationContext`]: policy type, SOAP-ness, WSDL and tag
//! - [`PolicyValidatorResult`]: errors and warnings, each bound to an assertion
//!
//! No validation logic lives here; see the `policy-validator` crate.

#![deny(unsafe_code)]

pub mod assertion;
pub mod capability;
pub mod context;
pub mod document;
pub mod error;
pub mod ids;
pub mod kind;
pub mod metadata;
pub mod path;
pub mod policy;
pub mod result;

pub use assertion::{Assertion, AssertionBuilder};
pub use capability::{
    Capability, IdentityTarget, IdentityTargetKind, KeyReference, MessageTarget, NamespaceMap,
    PrivateKeyRef, RecipientActor, RecipientContext, VariableMetadata, VariableType,
    WssDecoration,
};
pub use context::{
    BindingOperation, PolicyValidationContext, SoapVersion, WsdlInspector, SOAP_1_1_ENVELOPE_NS,
    SOAP_1_2_ENVELOPE_NS,
};
pub use document::{assertion_from_json, AssertionSpec, PolicyDocument};
pub use error::{ModelError, WsdlError};
pub use ids::{PolicyGoid, PolicyGuid, PolicyHeader, PolicyType};
pub use kind::{
    AssertionKind, ExtensionAssertion, ProofOfPossession, SecurityTokenType, StylesheetSource,
};
pub use metadata::{AssertionMetadata, ValidatorFlag};
pub use path::{AssertionPath, PathId};
pub use policy::Policy;
pub use result::{Diagnostic, PolicyValidatorResult, RemedialAction, Severity};
