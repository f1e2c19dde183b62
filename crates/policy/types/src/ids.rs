//! Identity types for policies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Stable, globally unique identifier of a policy.
///
/// Include assertions reference their fragment by this value; it survives
/// export/import between gateway clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyGuid(Uuid);

impl PolicyGuid {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// GUID used for a policy that has not been saved yet.
    pub fn unsaved() -> Self {
        Self(Uuid::nil())
    }

    pub fn is_unsaved(&self) -> bool {
        self.0.is_nil()
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for PolicyGuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PolicyGuid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Cluster-local numeric identifier of a persisted policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyGoid(pub u64);

impl PolicyGoid {
    /// Marker for a policy with no persisted row.
    pub const DEFAULT: PolicyGoid = PolicyGoid(0);
}

impl fmt::Display for PolicyGoid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "goid:{:016x}", self.0)
    }
}

/// What a policy is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyType {
    /// Policy owned by exactly one published service.
    PrivateService,
    /// Service policy shared between several published services.
    SharedService,
    /// Fragment included into other policies by GUID.
    IncludeFragment,
    /// Fragment run before or after every service policy.
    GlobalFragment,
    /// Gateway-internal policy, identified by its tag.
    Internal,
    /// Policy backing an identity provider.
    IdentityProvider,
}

impl PolicyType {
    /// Top-level service policies get whole-path summary warnings.
    pub fn is_service_policy(&self) -> bool {
        matches!(self, PolicyType::PrivateService | PolicyType::SharedService)
    }

    pub fn is_fragment(&self) -> bool {
        matches!(
            self,
            PolicyType::IncludeFragment | PolicyType::GlobalFragment | PolicyType::Internal
        )
    }
}

impl Default for PolicyType {
    fn default() -> Self {
        PolicyType::PrivateService
    }
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PolicyType::PrivateService => "private service",
            PolicyType::SharedService => "shared service",
            PolicyType::IncludeFragment => "include fragment",
            PolicyType::GlobalFragment => "global fragment",
            PolicyType::Internal => "internal",
            PolicyType::IdentityProvider => "identity provider",
        };
        f.write_str(label)
    }
}

/// Identity and classification of a policy, without its content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyHeader {
    pub guid: PolicyGuid,
    #[serde(default = "default_goid")]
    pub goid: PolicyGoid,
    pub name: String,
    #[serde(default)]
    pub policy_type: PolicyType,
}

fn default_goid() -> PolicyGoid {
    PolicyGoid::DEFAULT
}

impl PolicyHeader {
    pub fn new(guid: PolicyGuid, name: impl Into<String>, policy_type: PolicyType) -> Self {
        Self {
            guid,
            goid: PolicyGoid::DEFAULT,
            name: name.into(),
            policy_type,
        }
    }

    pub fn with_goid(mut self, goid: PolicyGoid) -> Self {
        self.goid = goid;
        self
    }

    /// Header for a policy being edited that has no identity yet.
    pub fn unsaved(name: impl Into<String>, policy_type: PolicyType) -> Self {
        Self::new(PolicyGuid::unsaved(), name, policy_type)
    }
}

impl fmt::Display for PolicyHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.guid)
    }
}
