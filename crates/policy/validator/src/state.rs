//! Per-path traversal state.
//!
//! Owned by one [`PathValidator`](crate::PathValidator) and dropped when its
//! path is done. Nothing here is shared between paths.

use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap, HashSet};

use policy_types::{MessageTarget, RecipientActor};

/// What has been established for one WS-Security actor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActorState {
    pub credentials: bool,
    /// Credentials gathered since the last credential modifier.
    pub credentials_since_modified: bool,
    pub wss_signature: bool,
    pub saml_security: bool,
}

/// What has been established for one message (request, response or a
/// message variable).
#[derive(Debug, Default)]
pub struct TargetState {
    seen_kinds: HashSet<Cow<'static, str>>,
    actors: HashMap<RecipientActor, ActorState>,
    pub access_control: bool,
    /// A built-in identity assertion has run.
    pub identity: bool,
    pub specific_user: bool,
    pub authentication: bool,
    pub allows_multiple_signatures: bool,
}

impl TargetState {
    pub fn actor(&self, actor: &RecipientActor) -> ActorState {
        self.actors.get(actor).copied().unwrap_or_default()
    }

    pub fn actor_mut(&mut self, actor: &RecipientActor) -> &mut ActorState {
        self.actors.entry(actor.clone()).or_default()
    }

    pub fn has_seen(&self, kind: &str) -> bool {
        self.seen_kinds.contains(kind)
    }

    pub fn mark_seen(&mut self, kind: Cow<'static, str>) {
        self.seen_kinds.insert(kind);
    }

    pub fn has_credentials(&self) -> bool {
        self.actors.values().any(|s| s.credentials)
    }
}

/// Everything one path walk has learned so far.
#[derive(Debug, Default)]
pub struct TraversalState {
    targets: HashMap<String, TargetState>,
    /// A routing assertion that forwards the request has run.
    pub routing: bool,
    /// Any routing assertion has run, echo included.
    pub routing_present: bool,
    pub response_available: bool,
    pub xml_parsing: bool,
    pub custom_access_control: bool,
    /// A response decoration adds a token the client can verify signatures with.
    pub response_security_token: bool,
    identity_tags: HashSet<String>,
    authenticated_actors: BTreeSet<RecipientActor>,
    decorated_response_actors: BTreeSet<RecipientActor>,
}

impl TraversalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(&self, target: &MessageTarget) -> Option<&TargetState> {
        self.targets.get(&target.key())
    }

    pub fn target_mut(&mut self, target: &MessageTarget) -> &mut TargetState {
        self.targets.entry(target.key()).or_default()
    }

    pub fn actor(&self, target: &MessageTarget, actor: &RecipientActor) -> ActorState {
        self.target(target)
            .map(|t| t.actor(actor))
            .unwrap_or_default()
    }

    pub fn has_seen(&self, target: &MessageTarget, kind: &str) -> bool {
        self.target(target).is_some_and(|t| t.has_seen(kind))
    }

    pub fn mark_seen(&mut self, target: &MessageTarget, kind: Cow<'static, str>) {
        self.target_mut(target).mark_seen(kind);
    }

    pub fn access_control(&self, target: &MessageTarget) -> bool {
        self.target(target).is_some_and(|t| t.access_control)
    }

    pub fn record_identity_tag(&mut self, tag: &str) {
        self.identity_tags.insert(tag.to_string());
    }

    pub fn has_identity_tag(&self, tag: &str) -> bool {
        self.identity_tags.contains(tag)
    }

    pub fn record_authenticated_actor(&mut self, actor: &RecipientActor) {
        self.authenticated_actors.insert(actor.clone());
    }

    pub fn record_decorated_response_actor(&mut self, actor: &RecipientActor) {
        self.decorated_response_actors.insert(actor.clone());
    }

    pub fn authenticated_actors(&self) -> &BTreeSet<RecipientActor> {
        &self.authenticated_actors
    }

    pub fn decorated_response_actors(&self) -> &BTreeSet<RecipientActor> {
        &self.decorated_response_actors
    }

    /// Whether some message has credentials that no access control checked.
    pub fn has_unauthenticated_credentials(&self) -> bool {
        self.targets
            .values()
            .any(|t| t.has_credentials() && !t.access_control)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actors_are_isolated() {
        let mut state = TraversalState::new();
        let a = RecipientActor::named("urn:a");
        let b = RecipientActor::named("urn:b");
        state
            .target_mut(&MessageTarget::Request)
            .actor_mut(&a)
            .credentials = true;

        assert!(state.actor(&MessageTarget::Request, &a).credentials);
        assert!(!state.actor(&MessageTarget::Request, &b).credentials);
        assert!(!state.actor(&MessageTarget::Response, &a).credentials);
    }

    #[test]
    fn variable_targets_match_case_insensitively() {
        let mut state = TraversalState::new();
        state.mark_seen(&MessageTarget::Variable("Msg".into()), Cow::Borrowed("regex"));
        assert!(state.has_seen(&MessageTarget::Variable("msg".into()), "regex"));
        assert!(!state.has_seen(&MessageTarget::Request, "regex"));
    }

    #[test]
    fn unauthenticated_credentials() {
        let mut state = TraversalState::new();
        assert!(!state.has_unauthenticated_credentials());
        state
            .target_mut(&MessageTarget::Request)
            .actor_mut(&RecipientActor::Local)
            .credentials = true;
        assert!(state.has_unauthenticated_credentials());
        state.target_mut(&MessageTarget::Request).access_control = true;
        assert!(!state.has_unauthenticated_credentials());
    }
}
