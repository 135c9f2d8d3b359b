//! The resolver capability interface and the priority-ordered registry.
//!
//! A resolver is anything that can turn a [`Request`] into items: pulling
//! from storage, crafting, gathering. The request manager offers each pending
//! request to resolvers in ascending priority value and the first one that
//! both accepts and resolves it is assigned.
//!
//! Resolvers never touch the request graph directly. They read it through
//! [`ResolveContext`] and describe what they want done in a [`Resolution`];
//! the manager applies the state changes.

use crate::book::RecipeBook;
use crate::colony::Colony;
use crate::gating::ColonyContext;
use crate::id::{BuildingId, RecipeToken, RequestId, ResolverId};
use crate::request::{Deliverable, Request};
use crate::research::ResearchView;
use crate::store::RecipeStore;
use slotmap::SlotMap;

/// Warehouse pulls are tried before anything is crafted.
pub const WAREHOUSE_PRIORITY: i32 = 100;
pub const CRAFTING_PRIORITY: i32 = 170;

/// Translation key used when a resolver has nothing more specific to show.
pub const GENERAL_REQUESTER_KEY: &str = "com.colony.requestsystem.requester.general";

// ---------------------------------------------------------------------------
// Context and results
// ---------------------------------------------------------------------------

/// Everything a resolver may consult or change while handling a request.
pub struct ResolveContext<'a> {
    pub colony: &'a mut Colony,
    pub requests: &'a SlotMap<RequestId, Request>,
    pub book: &'a RecipeBook,
    pub store: &'a mut RecipeStore,
    pub research: &'a dyn ResearchView,
}

impl ResolveContext<'_> {
    /// Read-only gating view of this colony.
    pub fn gating(&self) -> ColonyContext<'_> {
        ColonyContext::new(self.colony.id(), self.research, &*self.store)
    }

    pub fn request(&self, id: RequestId) -> Option<&Request> {
        self.requests.get(id)
    }

    /// Walk the parent chain of `request`, nearest first.
    pub fn ancestors<'r>(&'r self, request: &'r Request) -> impl Iterator<Item = &'r Request> + 'r {
        std::iter::successors(request.parent().and_then(|p| self.requests.get(p)), move |r| {
            r.parent().and_then(|p| self.requests.get(p))
        })
    }
}

/// How a successful resolution leaves the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// A worker still has to act; the request waits for children or for the
    /// action callbacks.
    Pending,
    /// Items were handed over during resolution.
    Delivered,
}

/// Where a parent stands after one of its children completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildProgress {
    /// Other children are still outstanding.
    Waiting,
    /// Every child is done; the parent can be worked on.
    Ready,
    /// The commitment can no longer be honoured (the assigned building is
    /// gone). The parent is set aside and offered to resolvers again.
    Reattempt,
}

/// What a resolver committed to.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Deliverables that must be fulfilled first, in order.
    pub children: Vec<Deliverable>,
    /// Building performing the work, which also receives the children.
    pub assignee: Option<BuildingId>,
    /// Recipe chosen, recorded so a re-attempt can skip it.
    pub recipe: Option<RecipeToken>,
    pub outcome: ResolveOutcome,
}

impl Resolution {
    pub fn delivered() -> Self {
        Self {
            children: Vec::new(),
            assignee: None,
            recipe: None,
            outcome: ResolveOutcome::Delivered,
        }
    }
}

/// Text shown for a resolver in request views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayName {
    /// A translation key for the client to localise.
    Key(String),
    Literal(String),
}

// ---------------------------------------------------------------------------
// Resolver trait
// ---------------------------------------------------------------------------

pub trait Resolver {
    /// Stable name for logs.
    fn name(&self) -> &str;

    /// Lower values are asked first.
    fn priority(&self) -> i32;

    /// Cheap eligibility check. Must not mutate anything.
    fn can_resolve(&self, request: &Request, ctx: &ResolveContext<'_>) -> bool;

    /// Commit to the request. `None` means the resolver could not follow
    /// through after all and the next one should be tried.
    fn resolve(&mut self, request: &Request, ctx: &mut ResolveContext<'_>) -> Option<Resolution>;

    /// A child of `parent` completed.
    fn on_child_complete(
        &mut self,
        _parent: &Request,
        _child: &Request,
        _ctx: &mut ResolveContext<'_>,
    ) -> ChildProgress {
        ChildProgress::Ready
    }

    /// A child of `parent` was cancelled. Returns `true` if the parent should
    /// be re-attempted, `false` if it should be cancelled as well.
    fn on_child_cancelled(
        &mut self,
        _parent: &Request,
        _child: &Request,
        _ctx: &mut ResolveContext<'_>,
    ) -> bool {
        true
    }

    /// A request assigned to this resolver was cancelled or overruled.
    fn on_request_cancelled(&mut self, _request: &Request, _ctx: &mut ResolveContext<'_>) {}

    /// The worker finished the physical action. Returns `false` if the
    /// result could not be delivered.
    fn on_action_finished(&mut self, _request: &Request, _ctx: &mut ResolveContext<'_>) -> bool {
        true
    }

    fn display_name(&self, _request: &Request, _ctx: &ResolveContext<'_>) -> DisplayName {
        DisplayName::Key(GENERAL_REQUESTER_KEY.to_string())
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

struct ResolverEntry {
    id: ResolverId,
    priority: i32,
    resolver: Box<dyn Resolver>,
}

/// Resolvers sorted by ascending priority value, ties in registration order.
#[derive(Default)]
pub struct ResolverRegistry {
    entries: Vec<ResolverEntry>,
    next_id: u32,
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| (e.id, e.priority, e.resolver.name())))
            .finish()
    }
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, resolver: Box<dyn Resolver>) -> ResolverId {
        let priority = resolver.priority();
        self.register_with_priority(resolver, priority)
    }

    /// Register with a priority other than the resolver's own.
    pub fn register_with_priority(
        &mut self,
        resolver: Box<dyn Resolver>,
        priority: i32,
    ) -> ResolverId {
        let id = ResolverId(self.next_id);
        self.next_id += 1;
        let at = self.entries.partition_point(|e| e.priority <= priority);
        self.entries.insert(
            at,
            ResolverEntry {
                id,
                priority,
                resolver,
            },
        );
        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids in dispatch order.
    pub fn ids(&self) -> Vec<ResolverId> {
        self.entries.iter().map(|e| e.id).collect()
    }

    pub fn priority_of(&self, id: ResolverId) -> Option<i32> {
        self.entries.iter().find(|e| e.id == id).map(|e| e.priority)
    }

    pub fn get(&self, id: ResolverId) -> Option<&dyn Resolver> {
        self.entries.iter().find(|e| e.id == id).map(|e| e.resolver.as_ref())
    }

    pub fn get_mut(&mut self, id: ResolverId) -> Option<&mut (dyn Resolver + 'static)> {
        self.entries
            .iter_mut()
            .find(|e| e.id == id)
            .map(|e| e.resolver.as_mut())
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.resolver.name()).collect()
    }
}
