//! Requests: what a building needs, and where it stands.

use crate::id::{BuildingId, RecipeToken, RequestId, ResolverId};
use crate::item::{ItemStack, StackPredicate};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("request not found: {0:?}")]
    NotFound(RequestId),
    #[error("request {request:?}: illegal transition {from:?} -> {to:?}")]
    InvalidTransition {
        request: RequestId,
        from: RequestState,
        to: RequestState,
    },
    #[error("request {0:?} has no assigned resolver")]
    NotAssigned(RequestId),
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestState {
    Created,
    Resolving,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
    /// A committed resolver was set aside; the request goes back to
    /// resolving on the next step.
    Overruled,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestState::Completed | RequestState::Cancelled)
    }

    /// Legal edges of the request lifecycle.
    pub fn can_transition_to(self, next: RequestState) -> bool {
        use RequestState::*;
        match (self, next) {
            (_, Cancelled) => !self.is_terminal(),
            (Created, Resolving) => true,
            (Overruled, Resolving) => true,
            (Resolving, Assigned) => true,
            (Assigned, InProgress) => true,
            (Assigned | InProgress, Completed) => true,
            (Resolving | Assigned | InProgress, Overruled) => true,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Deliverables and requesters
// ---------------------------------------------------------------------------

/// What a request asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Deliverable {
    /// Items matching a predicate. `min_count` is the least the requester
    /// will accept from a partial delivery.
    Stack {
        predicate: StackPredicate,
        count: u32,
        min_count: u32,
    },
    /// The crafted output of some recipe.
    Craft { output: StackPredicate, count: u32 },
}

impl Deliverable {
    pub fn stack(stack: &ItemStack) -> Self {
        Deliverable::Stack {
            predicate: StackPredicate::exact(stack),
            count: stack.count,
            min_count: stack.count,
        }
    }

    pub fn craft(output: &ItemStack) -> Self {
        Deliverable::Craft {
            output: StackPredicate::exact(output),
            count: output.count,
        }
    }

    pub fn predicate(&self) -> &StackPredicate {
        match self {
            Deliverable::Stack { predicate, .. } => predicate,
            Deliverable::Craft { output, .. } => output,
        }
    }

    pub fn count(&self) -> u32 {
        match *self {
            Deliverable::Stack { count, .. } | Deliverable::Craft { count, .. } => count,
        }
    }

    pub fn is_stack(&self) -> bool {
        matches!(self, Deliverable::Stack { .. })
    }
}

/// Who a request's items go to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Requester {
    Building(BuildingId),
    /// A player or other actor outside the colony's buildings.
    External(String),
}

impl Requester {
    pub fn building(&self) -> Option<BuildingId> {
        match self {
            Requester::Building(id) => Some(*id),
            Requester::External(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Request {
    pub(crate) id: RequestId,
    pub(crate) deliverable: Deliverable,
    pub(crate) requester: Requester,
    pub(crate) state: RequestState,
    /// Higher is dispatched first.
    pub(crate) priority: i32,
    pub(crate) parent: Option<RequestId>,
    pub(crate) children: Vec<RequestId>,
    pub(crate) resolver: Option<ResolverId>,
    /// Set when every resolver declined on the last attempt.
    pub(crate) unresolved: bool,
    /// Creation sequence number, used to order equal priorities.
    pub(crate) sequence: u64,
    /// Building committed to fulfil the request, if any.
    pub(crate) assignee: Option<BuildingId>,
    /// Recipes already attempted for this request.
    pub(crate) tried_recipes: Vec<RecipeToken>,
}

impl Request {
    pub(crate) fn new(
        deliverable: Deliverable,
        requester: Requester,
        priority: i32,
        parent: Option<RequestId>,
        sequence: u64,
    ) -> Self {
        Self {
            id: RequestId::default(),
            deliverable,
            requester,
            state: RequestState::Created,
            priority,
            parent,
            children: Vec::new(),
            resolver: None,
            unresolved: false,
            sequence,
            assignee: None,
            tried_recipes: Vec::new(),
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn deliverable(&self) -> &Deliverable {
        &self.deliverable
    }

    pub fn requester(&self) -> &Requester {
        &self.requester
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn parent(&self) -> Option<RequestId> {
        self.parent
    }

    pub fn children(&self) -> &[RequestId] {
        &self.children
    }

    pub fn resolver(&self) -> Option<ResolverId> {
        self.resolver
    }

    pub fn is_unresolved(&self) -> bool {
        self.unresolved
    }

    pub fn assignee(&self) -> Option<BuildingId> {
        self.assignee
    }

    pub fn tried_recipes(&self) -> &[RecipeToken] {
        &self.tried_recipes
    }

    /// Move to `next`, rejecting edges the lifecycle does not have.
    pub(crate) fn transition(&mut self, next: RequestState) -> Result<(), RequestError> {
        if !self.state.can_transition_to(next) {
            return Err(RequestError::InvalidTransition {
                request: self.id,
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ItemKind;
    use RequestState::*;

    fn request() -> Request {
        Request::new(
            Deliverable::stack(&ItemStack::new(ItemKind(1), 4)),
            Requester::External("player".into()),
            0,
            None,
            0,
        )
    }

    #[test]
    fn happy_path() {
        let mut r = request();
        for next in [Resolving, Assigned, InProgress, Completed] {
            r.transition(next).unwrap();
        }
        assert!(r.state().is_terminal());
    }

    #[test]
    fn assigned_can_complete_directly() {
        let mut r = request();
        r.transition(Resolving).unwrap();
        r.transition(Assigned).unwrap();
        r.transition(Completed).unwrap();
    }

    #[test]
    fn overrule_returns_to_resolving() {
        let mut r = request();
        r.transition(Resolving).unwrap();
        r.transition(Assigned).unwrap();
        r.transition(Overruled).unwrap();
        r.transition(Resolving).unwrap();
        assert_eq!(r.state(), Resolving);
    }

    #[test]
    fn terminal_states_reject_everything() {
        let mut r = request();
        r.transition(Cancelled).unwrap();
        for next in [Created, Resolving, Assigned, InProgress, Completed, Cancelled, Overruled] {
            assert!(r.transition(next).is_err(), "{next:?}");
        }
    }

    #[test]
    fn illegal_edges() {
        let mut r = request();
        let err = r.transition(Completed).unwrap_err();
        assert!(matches!(
            err,
            RequestError::InvalidTransition { from: Created, to: Completed, .. }
        ));
        assert!(r.transition(Overruled).is_err());
        assert!(r.transition(InProgress).is_err());
    }

    #[test]
    fn deliverable_accessors() {
        let stack = ItemStack::new(ItemKind(3), 5);
        let d = Deliverable::craft(&stack);
        assert_eq!(d.count(), 5);
        assert!(d.predicate().matches(&stack));
        assert!(!d.is_stack());
    }
}
