//! Immutable inputs describing the policy being validated.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::WsdlError;
use crate::ids::{PolicyHeader, PolicyType};

pub const SOAP_1_1_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SOAP_1_2_ENVELOPE_NS: &str = "http://www.w3.org/2003/05/soap-envelope";

/// SOAP version of the published service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoapVersion {
    Soap11,
    Soap12,
}

impl SoapVersion {
    pub fn envelope_namespace(&self) -> &'static str {
        match self {
            SoapVersion::Soap11 => SOAP_1_1_ENVELOPE_NS,
            SoapVersion::Soap12 => SOAP_1_2_ENVELOPE_NS,
        }
    }

    /// Version whose envelope namespace is `uri`, if any.
    pub fn for_envelope_namespace(uri: &str) -> Option<SoapVersion> {
        match uri {
            SOAP_1_1_ENVELOPE_NS => Some(SoapVersion::Soap11),
            SOAP_1_2_ENVELOPE_NS => Some(SoapVersion::Soap12),
            _ => None,
        }
    }
}

impl fmt::Display for SoapVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoapVersion::Soap11 => f.write_str("SOAP 1.1"),
            SoapVersion::Soap12 => f.write_str("SOAP 1.2"),
        }
    }
}

/// One operation of a WSDL binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingOperation {
    pub name: String,
    #[serde(default)]
    pub input_name: Option<String>,
    #[serde(default)]
    pub input_namespace: Option<String>,
    #[serde(default)]
    pub output_name: Option<String>,
    #[serde(default)]
    pub output_namespace: Option<String>,
}

impl BindingOperation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input_name: None,
            input_namespace: None,
            output_name: None,
            output_namespace: None,
        }
    }

    pub fn with_input_namespace(mut self, ns: impl Into<String>) -> Self {
        self.input_namespace = Some(ns.into());
        self
    }

    pub fn with_output_namespace(mut self, ns: impl Into<String>) -> Self {
        self.output_namespace = Some(ns.into());
        self
    }

    pub fn input_message_name(&self) -> String {
        self.input_name
            .clone()
            .unwrap_or_else(|| format!("{}In", self.name))
    }

    pub fn output_message_name(&self) -> String {
        self.output_name
            .clone()
            .unwrap_or_else(|| format!("{}Out", self.name))
    }
}

/// Read-only view of the service WSDL.
pub trait WsdlInspector: Send + Sync {
    fn binding_operations(&self) -> Result<Vec<BindingOperation>, WsdlError>;

    /// Whether any binding declares MIME multipart (SwA) input.
    fn has_mime_multipart(&self) -> Result<bool, WsdlError>;
}

/// Everything the validator knows about the policy besides its tree.
#[derive(Clone)]
pub struct PolicyValidationContext {
    pub policy_type: PolicyType,
    pub policy_tag: Option<String>,
    /// Identity of the policy being validated, if saved.
    pub policy: Option<PolicyHeader>,
    pub wsdl: Option<Arc<dyn WsdlInspector>>,
    pub soap: bool,
    pub soap_version: Option<SoapVersion>,
}

impl PolicyValidationContext {
    pub fn new(policy_type: PolicyType) -> Self {
        Self {
            policy_type,
            policy_tag: None,
            policy: None,
            wsdl: None,
            soap: false,
            soap_version: None,
        }
    }

    /// Context for a SOAP service policy.
    pub fn soap_service() -> Self {
        Self::new(PolicyType::PrivateService).with_soap(true)
    }

    pub fn with_soap(mut self, soap: bool) -> Self {
        self.soap = soap;
        self
    }

    pub fn with_soap_version(mut self, version: SoapVersion) -> Self {
        self.soap = true;
        self.soap_version = Some(version);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.policy_tag = Some(tag.into());
        self
    }

    pub fn with_policy(mut self, header: PolicyHeader) -> Self {
        self.policy = Some(header);
        self
    }

    pub fn with_wsdl(mut self, wsdl: Arc<dyn WsdlInspector>) -> Self {
        self.wsdl = Some(wsdl);
        self
    }
}

impl Default for PolicyValidationContext {
    fn default() -> Self {
        Self::new(PolicyType::PrivateService)
    }
}

impl fmt::Debug for PolicyValidationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyValidationContext")
            .field("policy_type", &self.policy_type)
            .field("policy_tag", &self.policy_tag)
            .field("policy", &self.policy)
            .field("wsdl", &self.wsdl.is_some())
            .field("soap", &self.soap)
            .field("soap_version", &self.soap_version)
            .finish()
    }
}
