//! Linear assertion paths.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::assertion::Assertion;

/// Position of a path in the sequence produced for one validation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathId(pub usize);

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "path #{}", self.0)
    }
}

/// One OR-resolved branch of a policy tree, in execution order.
///
/// The path borrows nodes of the tree by reference count; it never owns a
/// subtree of its own.
#[derive(Debug, Clone)]
pub struct AssertionPath {
    id: PathId,
    assertions: Vec<Arc<Assertion>>,
}

impl AssertionPath {
    pub fn new(id: PathId, assertions: Vec<Arc<Assertion>>) -> Self {
        Self { id, assertions }
    }

    pub fn id(&self) -> PathId {
        self.id
    }

    pub fn assertions(&self) -> &[Arc<Assertion>] {
        &self.assertions
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Assertion>> {
        self.assertions.iter()
    }

    pub fn len(&self) -> usize {
        self.assertions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assertions.is_empty()
    }

    /// Index of `assertion` in the path, by identity.
    pub fn position(&self, assertion: &Arc<Assertion>) -> Option<usize> {
        self.assertions
            .iter()
            .position(|candidate| Arc::ptr_eq(candidate, assertion))
    }

    /// Enabled, non-comment assertions that run before `assertion`.
    pub fn predecessors<'a>(
        &'a self,
        assertion: &Arc<Assertion>,
    ) -> impl Iterator<Item = &'a Arc<Assertion>> + 'a {
        let end = self.position(assertion).unwrap_or(self.assertions.len());
        self.assertions[..end]
            .iter()
            .filter(|a| a.is_enabled() && !a.is_comment())
    }

    /// Last enabled, non-comment assertion; summary diagnostics attach here.
    pub fn last_effective(&self) -> Option<&Arc<Assertion>> {
        self.assertions
            .iter()
            .rev()
            .find(|a| a.is_enabled() && !a.is_comment())
    }
}

impl fmt::Display for AssertionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.id)?;
        for (i, assertion) in self.assertions.iter().enumerate() {
            let sep = if i == 0 { " " } else { " > " };
            write!(f, "{sep}{assertion}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::AssertionKind;

    #[test]
    fn predecessors_stop_at_assertion() {
        let a = Assertion::leaf(AssertionKind::HttpBasic);
        let b = Assertion::comment("skip");
        let c = Assertion::leaf(AssertionKind::EchoRouting);
        let path = AssertionPath::new(PathId(0), vec![a.clone(), b, c.clone()]);

        let before: Vec<_> = path.predecessors(&c).collect();
        assert_eq!(before.len(), 1);
        assert!(Arc::ptr_eq(before[0], &a));
        assert_eq!(path.position(&c), Some(2));
    }

    #[test]
    fn last_effective_skips_trailing_comments() {
        let a = Assertion::leaf(AssertionKind::HttpBasic);
        let path = AssertionPath::new(PathId(3), vec![a.clone(), Assertion::comment("end")]);
        assert!(Arc::ptr_eq(path.last_effective().unwrap(), &a));
        assert!(AssertionPath::new(PathId(4), vec![]).last_effective().is_none());
    }

    #[test]
    fn display_lists_assertions() {
        let path = AssertionPath::new(
            PathId(1),
            vec![
                Assertion::leaf(AssertionKind::HttpBasic),
                Assertion::leaf(AssertionKind::EchoRouting),
            ],
        );
        assert_eq!(path.to_string(), "path #1: http_basic > echo_routing");
    }
}
