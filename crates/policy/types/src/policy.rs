use std::sync::Arc;

use crate::assertion::Assertion;
use crate::ids::{PolicyGoid, PolicyGuid, PolicyHeader, PolicyType};

/// A saved policy: identity plus assertion tree.
#[derive(Debug, Clone)]
pub struct Policy {
    header: PolicyHeader,
    root: Arc<Assertion>,
}

impl Policy {
    pub fn new(header: PolicyHeader, root: Arc<Assertion>) -> Self {
        Self { header, root }
    }

    pub fn header(&self) -> &PolicyHeader {
        &self.header
    }

    pub fn guid(&self) -> PolicyGuid {
        self.header.guid
    }

    pub fn goid(&self) -> PolicyGoid {
        self.header.goid
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub fn policy_type(&self) -> PolicyType {
        self.header.policy_type
    }

    pub fn root(&self) -> &Arc<Assertion> {
        &self.root
    }
}
