//! Assertion tree nodes.
//!
//! Nodes are shared as `Arc<Assertion>`. Children are owned by their parent;
//! the parent link is a `Weak` installed once, when the parent is built.
//! Identity is pointer identity: compare nodes with `Arc::ptr_eq`.

use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use crate::capability::{
    Capability, IdentityTarget, MessageTarget, NamespaceMap, PrivateKeyRef, RecipientActor,
    RecipientContext, VariableMetadata, WssDecoration,
};
use crate::error::ModelError;
use crate::ids::PolicyGuid;
use crate::kind::AssertionKind;
use crate::metadata::{AssertionMetadata, ValidatorFlag};

static LOCAL_ACTOR: RecipientActor = RecipientActor::Local;
static REQUEST_TARGET: MessageTarget = MessageTarget::Request;

/// One node of a policy tree.
#[derive(Debug)]
pub struct Assertion {
    kind: AssertionKind,
    meta: AssertionMetadata,
    enabled: AtomicBool,
    parent: OnceLock<Weak<Assertion>>,
    children: Vec<Arc<Assertion>>,
    recipient: Option<RecipientContext>,
    target: Option<MessageTarget>,
    identity_target: Option<IdentityTarget>,
    identity_tag: Option<String>,
    private_key: Option<PrivateKeyRef>,
    wss_decoration: Option<WssDecoration>,
    extra_variables_used: Vec<String>,
    extra_variables_set: Vec<VariableMetadata>,
}

impl Assertion {
    pub fn builder(kind: AssertionKind) -> AssertionBuilder {
        AssertionBuilder::new(kind)
    }

    /// Enabled leaf with default capability data.
    pub fn leaf(kind: AssertionKind) -> Arc<Assertion> {
        let meta = kind.metadata();
        Arc::new(Self::with_defaults(kind, meta, true))
    }

    pub fn all(
        children: impl IntoIterator<Item = Arc<Assertion>>,
    ) -> Result<Arc<Assertion>, ModelError> {
        AssertionBuilder::new(AssertionKind::All).children(children).build()
    }

    pub fn one_or_more(
        children: impl IntoIterator<Item = Arc<Assertion>>,
    ) -> Result<Arc<Assertion>, ModelError> {
        AssertionBuilder::new(AssertionKind::OneOrMore)
            .children(children)
            .build()
    }

    pub fn comment(text: impl Into<String>) -> Arc<Assertion> {
        Self::leaf(AssertionKind::Comment { text: text.into() })
    }

    pub fn include(guid: PolicyGuid, name: impl Into<String>) -> Arc<Assertion> {
        Self::leaf(AssertionKind::Include {
            guid,
            name: name.into(),
        })
    }

    fn with_defaults(kind: AssertionKind, meta: AssertionMetadata, enabled: bool) -> Self {
        let recipient = meta
            .has(Capability::SecurityHeaderAddressable)
            .then(RecipientContext::local);
        let target = meta
            .has(Capability::MessageTargetable)
            .then(|| kind.default_target());
        let private_key = meta
            .has(Capability::PrivateKeyable)
            .then(PrivateKeyRef::default_key);
        let wss_decoration = meta
            .has(Capability::WssDecorationConfig)
            .then(WssDecoration::default);

        Self {
            kind,
            meta,
            enabled: AtomicBool::new(enabled),
            parent: OnceLock::new(),
            children: Vec::new(),
            recipient,
            target,
            identity_target: None,
            identity_tag: None,
            private_key,
            wss_decoration,
            extra_variables_used: Vec::new(),
            extra_variables_set: Vec::new(),
        }
    }

    pub fn kind(&self) -> &AssertionKind {
        &self.kind
    }

    pub fn name(&self) -> Cow<'static, str> {
        self.kind.name()
    }

    pub fn meta(&self) -> &AssertionMetadata {
        &self.meta
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Authoring-time toggle. The validator never calls this.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn parent(&self) -> Option<Arc<Assertion>> {
        self.parent.get().and_then(Weak::upgrade)
    }

    pub fn children(&self) -> &[Arc<Assertion>] {
        &self.children
    }

    pub fn is_composite(&self) -> bool {
        self.kind.is_composite()
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.kind, AssertionKind::Comment { .. })
    }

    /// GUID referenced by an include assertion.
    pub fn included_guid(&self) -> Option<PolicyGuid> {
        match &self.kind {
            AssertionKind::Include { guid, .. } => Some(*guid),
            _ => None,
        }
    }

    /// A composite with no enabled, non-comment child always fails.
    pub fn has_effective_children(&self) -> bool {
        self.children
            .iter()
            .any(|child| child.is_enabled() && !child.is_comment())
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.meta.has(capability)
    }

    pub fn flagged(&self, flag: ValidatorFlag) -> bool {
        self.meta.flagged(flag)
    }

    pub fn is_credential_source(&self) -> bool {
        self.has(Capability::CredentialSource)
    }

    pub fn is_credential_modifier(&self) -> bool {
        self.has(Capability::CredentialModifier)
    }

    pub fn is_access_control(&self) -> bool {
        self.has(Capability::AccessControl)
    }

    pub fn is_routing(&self) -> bool {
        self.meta.is_routing
    }

    pub fn recipient(&self) -> Option<&RecipientContext> {
        self.recipient.as_ref()
    }

    /// Actor the assertion's security processing applies to; local when the
    /// kind is not security-header addressable.
    pub fn actor(&self) -> &RecipientActor {
        self.recipient
            .as_ref()
            .map(|r| &r.actor)
            .unwrap_or(&LOCAL_ACTOR)
    }

    pub fn is_default_actor(&self) -> bool {
        self.actor().is_local()
    }

    /// Message the assertion applies to; the request when not targetable.
    pub fn target(&self) -> &MessageTarget {
        self.target.as_ref().unwrap_or(&REQUEST_TARGET)
    }

    pub fn is_request(&self) -> bool {
        matches!(self.target(), MessageTarget::Request)
    }

    pub fn is_response(&self) -> bool {
        matches!(self.target(), MessageTarget::Response)
    }

    /// Configuration strings that may reference variables.
    pub fn variables_used(&self) -> Vec<String> {
        if !self.has(Capability::UsesVariables) {
            return Vec::new();
        }
        let mut expressions = self.kind.variable_expressions();
        expressions.extend(self.extra_variables_used.iter().cloned());
        expressions
    }

    /// Variables this assertion defines for its successors.
    pub fn variables_set(&self) -> Vec<VariableMetadata> {
        if !self.has(Capability::SetsVariables) {
            return Vec::new();
        }
        let mut variables = self.kind.declared_variables();
        variables.extend(self.extra_variables_set.iter().cloned());
        variables
    }

    pub fn namespaces(&self) -> Option<&NamespaceMap> {
        if self.has(Capability::NamespaceMigratable) {
            self.kind.namespaces()
        } else {
            None
        }
    }

    pub fn private_key(&self) -> Option<&PrivateKeyRef> {
        self.private_key.as_ref()
    }

    pub fn wss_decoration(&self) -> Option<&WssDecoration> {
        self.wss_decoration.as_ref()
    }

    pub fn identity_target(&self) -> Option<&IdentityTarget> {
        self.identity_target.as_ref()
    }

    pub fn identity_tag(&self) -> Option<&str> {
        self.identity_tag.as_deref()
    }
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            AssertionKind::Include { guid, name } if !name.is_empty() => {
                write!(f, "include {name} ({guid})")
            }
            AssertionKind::Include { guid, .. } => write!(f, "include {guid}"),
            _ => f.write_str(&self.name()),
        }
    }
}

/// Builder for [`Assertion`] nodes.
///
/// Capability data may only be attached when the kind advertises the
/// matching capability.
#[derive(Debug)]
pub struct AssertionBuilder {
    kind: AssertionKind,
    enabled: bool,
    children: Vec<Arc<Assertion>>,
    recipient: Option<RecipientContext>,
    target: Option<MessageTarget>,
    identity_target: Option<IdentityTarget>,
    identity_tag: Option<String>,
    private_key: Option<PrivateKeyRef>,
    wss_decoration: Option<WssDecoration>,
    variables_used: Vec<String>,
    variables_set: Vec<VariableMetadata>,
}

impl AssertionBuilder {
    pub fn new(kind: AssertionKind) -> Self {
        Self {
            kind,
            enabled: true,
            children: Vec::new(),
            recipient: None,
            target: None,
            identity_target: None,
            identity_tag: None,
            private_key: None,
            wss_decoration: None,
            variables_used: Vec::new(),
            variables_set: Vec::new(),
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn disabled(self) -> Self {
        self.enabled(false)
    }

    pub fn child(mut self, child: Arc<Assertion>) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Arc<Assertion>>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn recipient(mut self, recipient: RecipientContext) -> Self {
        self.recipient = Some(recipient);
        self
    }

    /// Shorthand for a named WS-Security actor.
    pub fn actor(self, actor: impl Into<String>) -> Self {
        self.recipient(RecipientContext::for_actor(actor))
    }

    pub fn target(mut self, target: MessageTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn identity_target(mut self, target: IdentityTarget) -> Self {
        self.identity_target = Some(target);
        self
    }

    pub fn identity_tag(mut self, tag: impl Into<String>) -> Self {
        self.identity_tag = Some(tag.into());
        self
    }

    pub fn private_key(mut self, key: PrivateKeyRef) -> Self {
        self.private_key = Some(key);
        self
    }

    pub fn wss_decoration(mut self, decoration: WssDecoration) -> Self {
        self.wss_decoration = Some(decoration);
        self
    }

    pub fn uses_variable(mut self, expression: impl Into<String>) -> Self {
        self.variables_used.push(expression.into());
        self
    }

    pub fn sets_variable(mut self, variable: VariableMetadata) -> Self {
        self.variables_set.push(variable);
        self
    }

    pub fn build(self) -> Result<Arc<Assertion>, ModelError> {
        let meta = self.kind.metadata();
        let kind_name = meta.name.to_string();

        if !self.children.is_empty() && !self.kind.is_composite() {
            return Err(ModelError::ChildrenOnLeaf(kind_name));
        }
        if self.children.iter().any(|child| child.parent.get().is_some()) {
            return Err(ModelError::AlreadyAttached);
        }

        let attached = [
            (self.recipient.is_some(), Capability::SecurityHeaderAddressable),
            (self.target.is_some(), Capability::MessageTargetable),
            (self.identity_target.is_some(), Capability::IdentityTargetable),
            (self.identity_tag.is_some(), Capability::IdentityTagable),
            (self.private_key.is_some(), Capability::PrivateKeyable),
            (self.wss_decoration.is_some(), Capability::WssDecorationConfig),
            (!self.variables_used.is_empty(), Capability::UsesVariables),
            (!self.variables_set.is_empty(), Capability::SetsVariables),
        ];
        if let Some((_, capability)) = attached
            .iter()
            .find(|(present, capability)| *present && !meta.has(*capability))
        {
            return Err(ModelError::UnsupportedCapability {
                kind: kind_name,
                capability: *capability,
            });
        }

        let mut node = Assertion::with_defaults(self.kind, meta, self.enabled);
        if self.recipient.is_some() {
            node.recipient = self.recipient;
        }
        if self.target.is_some() {
            node.target = self.target;
        }
        if self.private_key.is_some() {
            node.private_key = self.private_key;
        }
        if self.wss_decoration.is_some() {
            node.wss_decoration = self.wss_decoration;
        }
        node.identity_target = self.identity_target;
        node.identity_tag = self.identity_tag;
        node.extra_variables_used = self.variables_used;
        node.extra_variables_set = self.variables_set;
        node.children = self.children;

        Ok(Arc::new_cyclic(|weak| {
            for child in &node.children {
                // Checked above; a concurrent attach would only lose its own link.
                let _ = child.parent.set(weak.clone());
            }
            node
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_basic() -> Arc<Assertion> {
        Assertion::leaf(AssertionKind::HttpBasic)
    }

    #[test]
    fn parent_links_are_installed() {
        let child = http_basic();
        let root = Assertion::all(vec![child.clone()]).unwrap();
        let parent = child.parent().unwrap();
        assert!(Arc::ptr_eq(&parent, &root));
        assert!(root.parent().is_none());
    }

    #[test]
    fn child_cannot_be_attached_twice() {
        let child = http_basic();
        let _first = Assertion::all(vec![child.clone()]).unwrap();
        let second = Assertion::all(vec![child]);
        assert_eq!(second.unwrap_err(), ModelError::AlreadyAttached);
    }

    #[test]
    fn leaf_rejects_children() {
        let err = Assertion::builder(AssertionKind::HttpBasic)
            .child(http_basic())
            .build()
            .unwrap_err();
        assert_eq!(err, ModelError::ChildrenOnLeaf("http_basic".into()));
    }

    #[test]
    fn capability_data_requires_capability() {
        let err = Assertion::builder(AssertionKind::HttpBasic)
            .actor("urn:other")
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ModelError::UnsupportedCapability {
                capability: Capability::SecurityHeaderAddressable,
                ..
            }
        ));
    }

    #[test]
    fn advertised_capabilities_get_defaults() {
        let sign = Assertion::leaf(AssertionKind::WssSignElement {
            xpath: "/s:Envelope/s:Body".into(),
            namespaces: NamespaceMap::new(),
        });
        assert!(sign.is_default_actor());
        assert!(sign.is_response());
        assert_eq!(sign.private_key(), Some(&PrivateKeyRef::default_key()));
        assert!(sign.wss_decoration().is_some());

        let basic = http_basic();
        assert!(basic.recipient().is_none());
        assert!(basic.is_request());
        assert!(basic.private_key().is_none());
    }

    #[test]
    fn named_actor_and_target() {
        let node = Assertion::builder(AssertionKind::WssBasic)
            .actor("urn:partner")
            .target(MessageTarget::Variable("saved".into()))
            .build()
            .unwrap();
        assert_eq!(node.actor(), &RecipientActor::named("urn:partner"));
        assert!(!node.is_request());
        assert!(!node.is_response());
    }

    #[test]
    fn enabled_flag_toggles() {
        let node = Assertion::builder(AssertionKind::HttpBasic)
            .disabled()
            .build()
            .unwrap();
        assert!(!node.is_enabled());
        node.set_enabled(true);
        assert!(node.is_enabled());
    }

    #[test]
    fn effective_children_ignore_comments_and_disabled() {
        let disabled = Assertion::builder(AssertionKind::HttpBasic)
            .disabled()
            .build()
            .unwrap();
        let root = Assertion::all(vec![disabled, Assertion::comment("note")]).unwrap();
        assert!(!root.has_effective_children());
    }

    #[test]
    fn variables_follow_capabilities() {
        let set = Assertion::leaf(AssertionKind::SetVariable {
            name: "greeting".into(),
            expression: "hello ${request.username}".into(),
        });
        assert_eq!(set.variables_set()[0].name, "greeting");
        assert_eq!(set.variables_used(), vec!["hello ${request.username}".to_string()]);
        assert!(http_basic().variables_used().is_empty());
    }

    #[test]
    fn display_names_includes() {
        let guid = PolicyGuid::generate();
        let include = Assertion::include(guid, "common");
        assert_eq!(include.to_string(), format!("include common ({guid})"));
        assert_eq!(http_basic().to_string(), "http_basic");
    }
}
