//! Per-colony request manager: owns the request graph, runs priority
//! dispatch, and drives the request lifecycle.
//!
//! # Dispatch
//!
//! Each [`dispatch`](RequestManager::dispatch) pass collects the requests
//! waiting for a resolver (new, overruled, and, when the colony is dirty,
//! previously unresolved ones), orders them by priority hint then creation,
//! and offers each to the resolvers in registry order. Child requests created
//! by a resolver are appended to the same pass.
//!
//! # Cancellation
//!
//! Cancelling a request cancels its open descendants. Children that already
//! completed keep their state. The parent of an individually cancelled
//! request is asked whether it wants to re-attempt with another recipe.

use crate::book::RecipeBook;
use crate::colony::Colony;
use crate::event::{RequestEvent, RequestEventBus};
use crate::id::{BuildingId, ColonyId, RequestId, ResolverId};
use crate::request::{Deliverable, Request, RequestError, RequestState, Requester};
use crate::research::ResearchView;
use crate::resolver::{
    ChildProgress, DisplayName, Resolution, ResolveContext, ResolveOutcome, Resolver,
    ResolverRegistry,
};
use crate::store::RecipeStore;
use slotmap::SlotMap;
use std::collections::VecDeque;

/// Mutable colony state the manager works against.
pub struct ColonyEnv<'a> {
    pub colony: &'a mut Colony,
    pub book: &'a RecipeBook,
    pub store: &'a mut RecipeStore,
    pub research: &'a dyn ResearchView,
}

/// Counts from one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub attempted: usize,
    pub assigned: usize,
    pub completed: usize,
    pub unresolved: usize,
    pub created: usize,
}

impl DispatchReport {
    /// Something moved forward in this pass.
    pub fn made_progress(&self) -> bool {
        self.assigned > 0 || self.completed > 0 || self.created > 0
    }
}

fn context<'r>(
    requests: &'r SlotMap<RequestId, Request>,
    env: &'r mut ColonyEnv<'_>,
) -> ResolveContext<'r> {
    ResolveContext {
        colony: &mut *env.colony,
        requests,
        book: env.book,
        store: &mut *env.store,
        research: env.research,
    }
}

#[derive(Debug)]
pub struct RequestManager {
    colony: ColonyId,
    requests: SlotMap<RequestId, Request>,
    resolvers: ResolverRegistry,
    events: RequestEventBus,
    next_sequence: u64,
    pass: u64,
}

impl RequestManager {
    pub fn new(colony: ColonyId) -> Self {
        Self {
            colony,
            requests: SlotMap::with_key(),
            resolvers: ResolverRegistry::new(),
            events: RequestEventBus::default(),
            next_sequence: 0,
            pass: 0,
        }
    }

    pub fn colony(&self) -> ColonyId {
        self.colony
    }

    // -----------------------------------------------------------------------
    // Resolvers
    // -----------------------------------------------------------------------

    pub fn register_resolver(&mut self, resolver: Box<dyn Resolver>) -> ResolverId {
        self.resolvers.register(resolver)
    }

    pub fn register_resolver_with_priority(
        &mut self,
        resolver: Box<dyn Resolver>,
        priority: i32,
    ) -> ResolverId {
        self.resolvers.register_with_priority(resolver, priority)
    }

    pub fn resolvers(&self) -> &ResolverRegistry {
        &self.resolvers
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    /// Create a root request. It is picked up by the next dispatch pass.
    pub fn create_request(
        &mut self,
        deliverable: Deliverable,
        requester: Requester,
        priority: i32,
    ) -> RequestId {
        self.insert_request(deliverable, requester, priority, None)
    }

    fn insert_request(
        &mut self,
        deliverable: Deliverable,
        requester: Requester,
        priority: i32,
        parent: Option<RequestId>,
    ) -> RequestId {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let id = self.requests.insert_with_key(|id| {
            let mut request = Request::new(deliverable, requester, priority, parent, sequence);
            request.id = id;
            request
        });
        if let Some(parent) = parent
            && let Some(p) = self.requests.get_mut(parent)
        {
            p.children.push(id);
        }
        self.events.emit(RequestEvent::Created {
            request: id,
            parent,
            pass: self.pass,
        });
        id
    }

    pub fn get(&self, id: RequestId) -> Option<&Request> {
        self.requests.get(id)
    }

    pub fn state(&self, id: RequestId) -> Result<RequestState, RequestError> {
        self.requests
            .get(id)
            .map(Request::state)
            .ok_or(RequestError::NotFound(id))
    }

    pub fn requests(&self) -> impl Iterator<Item = &Request> {
        self.requests.values()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Non-terminal requests made by a building.
    pub fn open_requests_of(&self, building: BuildingId) -> impl Iterator<Item = &Request> {
        self.requests
            .values()
            .filter(move |r| !r.state().is_terminal() && r.requester().building() == Some(building))
    }

    pub fn events(&self) -> &RequestEventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut RequestEventBus {
        &mut self.events
    }

    /// Number of dispatch passes run so far.
    pub fn pass(&self) -> u64 {
        self.pass
    }

    fn request_mut(&mut self, id: RequestId) -> Result<&mut Request, RequestError> {
        self.requests.get_mut(id).ok_or(RequestError::NotFound(id))
    }

    fn transition(&mut self, id: RequestId, next: RequestState) -> Result<(), RequestError> {
        self.request_mut(id)?.transition(next)
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    /// Offer every waiting request to the resolvers once.
    pub fn dispatch(&mut self, env: &mut ColonyEnv<'_>) -> Result<DispatchReport, RequestError> {
        self.pass += 1;
        let retry_unresolved = env.colony.dirty().is_dirty();
        env.colony.dirty_mut().mark_clean();

        let mut waiting: Vec<&Request> = self
            .requests
            .values()
            .filter(|r| match r.state() {
                RequestState::Created | RequestState::Overruled => true,
                RequestState::Resolving => {
                    r.resolver().is_none() && (!r.is_unresolved() || retry_unresolved)
                }
                _ => false,
            })
            .collect();
        waiting.sort_by_key(|r| (std::cmp::Reverse(r.priority()), r.sequence));
        let mut queue: VecDeque<RequestId> = waiting.into_iter().map(Request::id).collect();

        let mut report = DispatchReport::default();
        while let Some(id) = queue.pop_front() {
            self.attempt(id, env, &mut queue, &mut report)?;
        }
        if report.unresolved > 0 {
            tracing::debug!(
                colony = self.colony.0,
                pass = self.pass,
                ?report,
                "dispatch pass left requests unresolved"
            );
        }
        Ok(report)
    }

    fn attempt(
        &mut self,
        id: RequestId,
        env: &mut ColonyEnv<'_>,
        queue: &mut VecDeque<RequestId>,
        report: &mut DispatchReport,
    ) -> Result<(), RequestError> {
        match self.state(id)? {
            RequestState::Created | RequestState::Overruled => {
                self.transition(id, RequestState::Resolving)?
            }
            RequestState::Resolving => {}
            // Cancelled or completed earlier in this pass.
            _ => return Ok(()),
        }
        report.attempted += 1;

        for rid in self.resolvers.ids() {
            let Some(resolver) = self.resolvers.get_mut(rid) else {
                continue;
            };
            let request = &self.requests[id];
            let mut ctx = context(&self.requests, env);
            if !resolver.can_resolve(request, &ctx) {
                continue;
            }
            match resolver.resolve(request, &mut ctx) {
                Some(resolution) => {
                    tracing::debug!(request = ?id, resolver = resolver.name(), "request assigned");
                    return self.commit(id, rid, resolution, env, queue, report);
                }
                None => {
                    tracing::debug!(
                        request = ?id,
                        resolver = resolver.name(),
                        "resolver accepted but failed"
                    );
                    self.transition(id, RequestState::Overruled)?;
                    self.emit_overruled(id);
                    self.transition(id, RequestState::Resolving)?;
                }
            }
        }

        let request = self.request_mut(id)?;
        request.unresolved = true;
        // A later retry may use recipes this request already tried.
        request.tried_recipes.clear();
        report.unresolved += 1;
        tracing::debug!(request = ?id, "no resolver could handle request");
        self.events.emit(RequestEvent::Unresolved {
            request: id,
            pass: self.pass,
        });
        Ok(())
    }

    fn commit(
        &mut self,
        id: RequestId,
        resolver: ResolverId,
        resolution: Resolution,
        env: &mut ColonyEnv<'_>,
        queue: &mut VecDeque<RequestId>,
        report: &mut DispatchReport,
    ) -> Result<(), RequestError> {
        let request = self.request_mut(id)?;
        request.resolver = Some(resolver);
        request.assignee = resolution.assignee;
        request.unresolved = false;
        if let Some(recipe) = resolution.recipe {
            request.tried_recipes.push(recipe);
        }
        let priority = request.priority;
        let child_requester = match resolution.assignee {
            Some(building) => Requester::Building(building),
            None => request.requester.clone(),
        };

        match resolution.outcome {
            ResolveOutcome::Delivered => {
                self.assign(id, resolver)?;
                report.assigned += 1;
                self.complete(id, env, report)?;
            }
            ResolveOutcome::Pending if resolution.children.is_empty() => {
                self.assign(id, resolver)?;
                report.assigned += 1;
            }
            ResolveOutcome::Pending => {
                for deliverable in resolution.children {
                    let requester = child_requester.clone();
                    let child = self.insert_request(deliverable, requester, priority, Some(id));
                    report.created += 1;
                    queue.push_back(child);
                }
            }
        }
        Ok(())
    }

    fn assign(&mut self, id: RequestId, resolver: ResolverId) -> Result<(), RequestError> {
        self.transition(id, RequestState::Assigned)?;
        self.events.emit(RequestEvent::Assigned {
            request: id,
            resolver,
            pass: self.pass,
        });
        Ok(())
    }

    fn emit_overruled(&mut self, id: RequestId) {
        self.events.emit(RequestEvent::Overruled {
            request: id,
            pass: self.pass,
        });
    }

    /// Mark a request completed and tell its parent's resolver.
    fn complete(
        &mut self,
        id: RequestId,
        env: &mut ColonyEnv<'_>,
        report: &mut DispatchReport,
    ) -> Result<(), RequestError> {
        self.transition(id, RequestState::Completed)?;
        report.completed += 1;
        self.events.emit(RequestEvent::Completed {
            request: id,
            pass: self.pass,
        });

        let Some(parent_id) = self.requests[id].parent() else {
            return Ok(());
        };
        let Some(parent) = self.requests.get(parent_id) else {
            return Ok(());
        };
        if parent.state() != RequestState::Resolving {
            return Ok(());
        }
        let Some(rid) = parent.resolver() else {
            return Ok(());
        };
        let Some(resolver) = self.resolvers.get_mut(rid) else {
            return Ok(());
        };
        let mut ctx = context(&self.requests, env);
        let progress =
            resolver.on_child_complete(&self.requests[parent_id], &self.requests[id], &mut ctx);
        match progress {
            ChildProgress::Waiting => {}
            ChildProgress::Ready => {
                self.assign(parent_id, rid)?;
                report.assigned += 1;
            }
            ChildProgress::Reattempt => {
                tracing::debug!(request = ?parent_id, "commitment lost, re-attempting parent");
                self.reassign(parent_id, env)?;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Cancellation and overrule
    // -----------------------------------------------------------------------

    /// Cancel a request and its open descendants. The parent, if any, is
    /// re-attempted or cancelled depending on its resolver.
    pub fn cancel(&mut self, id: RequestId, env: &mut ColonyEnv<'_>) -> Result<(), RequestError> {
        let state = self.state(id)?;
        if state.is_terminal() {
            return Err(RequestError::InvalidTransition {
                request: id,
                from: state,
                to: RequestState::Cancelled,
            });
        }
        self.cancel_subtree(id, env)?;

        let Some(parent_id) = self.requests[id].parent() else {
            return Ok(());
        };
        let Some(parent) = self.requests.get(parent_id) else {
            return Ok(());
        };
        if parent.state().is_terminal() {
            return Ok(());
        }
        let retry = match parent.resolver().and_then(|rid| self.resolvers.get_mut(rid)) {
            Some(resolver) => {
                let mut ctx = context(&self.requests, env);
                resolver.on_child_cancelled(&self.requests[parent_id], &self.requests[id], &mut ctx)
            }
            None => true,
        };
        if retry {
            tracing::debug!(request = ?parent_id, "child cancelled, re-attempting parent");
            self.overrule(parent_id, env)
        } else {
            self.cancel(parent_id, env)
        }
    }

    fn cancel_subtree(
        &mut self,
        id: RequestId,
        env: &mut ColonyEnv<'_>,
    ) -> Result<(), RequestError> {
        let children = self.requests[id].children().to_vec();
        for child in children {
            if self.requests.get(child).is_some_and(|c| !c.state().is_terminal()) {
                self.cancel_subtree(child, env)?;
            }
        }
        self.release_resolver(id, env);
        self.transition(id, RequestState::Cancelled)?;
        self.events.emit(RequestEvent::Cancelled {
            request: id,
            pass: self.pass,
        });
        Ok(())
    }

    /// Let the assigned resolver drop its state for `id`.
    fn release_resolver(&mut self, id: RequestId, env: &mut ColonyEnv<'_>) {
        let Some(rid) = self.requests[id].resolver() else {
            return;
        };
        if let Some(resolver) = self.resolvers.get_mut(rid) {
            let mut ctx = context(&self.requests, env);
            resolver.on_request_cancelled(&self.requests[id], &mut ctx);
        }
    }

    /// Set aside the current resolution of an active request. Its open
    /// children are cancelled and it is offered to resolvers again on the
    /// next dispatch pass, skipping recipes it already tried.
    pub fn overrule(&mut self, id: RequestId, env: &mut ColonyEnv<'_>) -> Result<(), RequestError> {
        let state = self.state(id)?;
        if !state.can_transition_to(RequestState::Overruled) {
            return Err(RequestError::InvalidTransition {
                request: id,
                from: state,
                to: RequestState::Overruled,
            });
        }
        let children = self.requests[id].children().to_vec();
        for child in children {
            if self.requests.get(child).is_some_and(|c| !c.state().is_terminal()) {
                self.cancel_subtree(child, env)?;
            }
        }
        self.release_resolver(id, env);
        self.transition(id, RequestState::Overruled)?;
        let request = self.request_mut(id)?;
        request.resolver = None;
        request.assignee = None;
        self.emit_overruled(id);
        Ok(())
    }

    /// Overrule a request whose assigned building went away. The recipe it
    /// committed to did not fail, so it stays available for the retry.
    fn reassign(&mut self, id: RequestId, env: &mut ColonyEnv<'_>) -> Result<(), RequestError> {
        self.overrule(id, env)?;
        self.request_mut(id)?.tried_recipes.pop();
        Ok(())
    }

    /// Set aside every open request assigned to `building`, ahead of the
    /// building being removed. Returns how many were overruled.
    pub fn release_building(
        &mut self,
        building: BuildingId,
        env: &mut ColonyEnv<'_>,
    ) -> Result<usize, RequestError> {
        let mut assigned: Vec<&Request> = self
            .requests
            .values()
            .filter(|r| r.assignee() == Some(building))
            .collect();
        assigned.sort_by_key(|r| r.sequence);
        let assigned: Vec<RequestId> = assigned.into_iter().map(Request::id).collect();

        let mut released = 0;
        for id in assigned {
            // An earlier overrule may have cancelled this one as a child.
            if !self.state(id)?.can_transition_to(RequestState::Overruled) {
                continue;
            }
            self.reassign(id, env)?;
            released += 1;
        }
        Ok(released)
    }

    // -----------------------------------------------------------------------
    // Worker callbacks
    // -----------------------------------------------------------------------

    /// The assigned worker started the physical action.
    pub fn start_action(&mut self, id: RequestId) -> Result<(), RequestError> {
        self.transition(id, RequestState::InProgress)?;
        self.events.emit(RequestEvent::Started {
            request: id,
            pass: self.pass,
        });
        Ok(())
    }

    /// The assigned worker finished. Returns `false` if the resolver could
    /// not deliver, in which case the request was overruled.
    pub fn finish_action(
        &mut self,
        id: RequestId,
        env: &mut ColonyEnv<'_>,
    ) -> Result<bool, RequestError> {
        let state = self.state(id)?;
        if !state.can_transition_to(RequestState::Completed) {
            return Err(RequestError::InvalidTransition {
                request: id,
                from: state,
                to: RequestState::Completed,
            });
        }
        let rid = self.requests[id].resolver().ok_or(RequestError::NotAssigned(id))?;
        let Some(resolver) = self.resolvers.get_mut(rid) else {
            return Err(RequestError::NotAssigned(id));
        };
        let delivered = {
            let mut ctx = context(&self.requests, env);
            resolver.on_action_finished(&self.requests[id], &mut ctx)
        };
        if delivered {
            let mut report = DispatchReport::default();
            self.complete(id, env, &mut report)?;
        } else {
            tracing::debug!(request = ?id, "action could not be delivered, overruling");
            self.overrule(id, env)?;
        }
        Ok(delivered)
    }

    /// Display name of the resolver handling a request.
    pub fn display_name(&self, id: RequestId, env: &mut ColonyEnv<'_>) -> Option<DisplayName> {
        let request = self.requests.get(id)?;
        let resolver = self.resolvers.get(request.resolver()?)?;
        let ctx = context(&self.requests, env);
        Some(resolver.display_name(request, &ctx))
    }

    /// Drop finished request trees: terminal roots whose descendants are all
    /// terminal. Returns the number of requests removed.
    pub fn purge_finished(&mut self) -> usize {
        let roots: Vec<RequestId> = self
            .requests
            .values()
            .filter(|r| r.parent().is_none() && self.subtree_terminal(r.id()))
            .map(Request::id)
            .collect();
        let mut removed = 0;
        let mut stack = roots;
        while let Some(id) = stack.pop() {
            if let Some(request) = self.requests.remove(id) {
                stack.extend(request.children);
                removed += 1;
            }
        }
        removed
    }

    fn subtree_terminal(&self, id: RequestId) -> bool {
        self.requests.get(id).is_none_or(|r| {
            r.state().is_terminal() && r.children().iter().all(|&c| self.subtree_terminal(c))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crafting::CraftingResolver;
    use crate::event::RequestEventKind;
    use crate::id::ColonyId;
    use crate::item::ItemStack;
    use crate::research::NoResearch;
    use crate::warehouse::WarehouseResolver;
    use crate::test_utils::*;

    struct World {
        colony: Colony,
        book: RecipeBook,
        store: RecipeStore,
        manager: RequestManager,
    }

    impl World {
        fn new() -> Self {
            let mut book = RecipeBook::new();
            book.insert(bread_definition("baker"));
            let mut manager = RequestManager::new(ColonyId(0));
            manager.register_resolver(Box::new(CraftingResolver::new("baker")));
            manager.register_resolver(Box::new(WarehouseResolver::new()));
            Self {
                colony: Colony::new(ColonyId(0)),
                book,
                store: RecipeStore::new(),
                manager,
            }
        }

        fn dispatch(&mut self) -> DispatchReport {
            let mut env = ColonyEnv {
                colony: &mut self.colony,
                book: &self.book,
                store: &mut self.store,
                research: &NoResearch,
            };
            self.manager.dispatch(&mut env).unwrap()
        }

        fn cancel(&mut self, id: RequestId) -> Result<(), RequestError> {
            let mut env = ColonyEnv {
                colony: &mut self.colony,
                book: &self.book,
                store: &mut self.store,
                research: &NoResearch,
            };
            self.manager.cancel(id, &mut env)
        }

        fn finish(&mut self, id: RequestId) -> bool {
            let mut env = ColonyEnv {
                colony: &mut self.colony,
                book: &self.book,
                store: &mut self.store,
                research: &NoResearch,
            };
            self.manager.finish_action(id, &mut env).unwrap()
        }
    }

    #[test]
    fn warehouse_request_completes_in_one_pass() {
        let mut w = World::new();
        let _ = w.colony.warehouse_mut().add(&ItemStack::new(wheat(), 5));
        let id = w.manager.create_request(
            Deliverable::stack(&ItemStack::new(wheat(), 5)),
            Requester::External("player".into()),
            0,
        );
        let report = w.dispatch();
        assert_eq!(report.completed, 1);
        assert_eq!(w.manager.state(id).unwrap(), RequestState::Completed);
        assert!(w.colony.warehouse().stacks.is_empty());
    }

    #[test]
    fn craft_with_children_from_warehouse() {
        let mut w = World::new();
        let baker = w.colony.add_building(baker_building(1));
        let house = w.colony.add_building(crate::building::Building::plain("residence", 1));
        let _ = w.colony.warehouse_mut().add(&ItemStack::new(wheat(), 6));

        let id = w.manager.create_request(
            Deliverable::craft(&ItemStack::new(bread(), 2)),
            Requester::Building(house),
            0,
        );
        let report = w.dispatch();
        assert_eq!(report.created, 1);

        let request = w.manager.get(id).unwrap();
        assert_eq!(request.state(), RequestState::Assigned);
        assert_eq!(request.assignee(), Some(baker));
        let child = request.children()[0];
        assert_eq!(w.manager.state(child).unwrap(), RequestState::Completed);
        assert_eq!(w.colony.building(baker).unwrap().craft_queue().len(), 1);

        w.manager.start_action(id).unwrap();
        assert!(w.finish(id));
        assert_eq!(w.manager.state(id).unwrap(), RequestState::Completed);
        let house_inv = &w.colony.building(house).unwrap().inventory;
        assert_eq!(house_inv.count_of(&ItemStack::new(bread(), 1)), 2);
        assert_eq!(
            w.colony.building(baker).unwrap().inventory.count_of(&ItemStack::new(wheat(), 1)),
            0
        );
    }

    #[test]
    fn unresolved_request_waits_for_dirty_colony() {
        let mut w = World::new();
        let id = w.manager.create_request(
            Deliverable::stack(&ItemStack::new(wheat(), 2)),
            Requester::External("player".into()),
            0,
        );
        let report = w.dispatch();
        assert_eq!(report.unresolved, 1);
        assert!(w.manager.get(id).unwrap().is_unresolved());
        assert_eq!(w.manager.state(id).unwrap(), RequestState::Resolving);
        assert_eq!(w.manager.events().count(RequestEventKind::Unresolved), 1);

        // Nothing changed: not retried.
        assert_eq!(w.dispatch().attempted, 0);

        let _ = w.colony.warehouse_mut().add(&ItemStack::new(wheat(), 2));
        let report = w.dispatch();
        assert_eq!(report.completed, 1);
        assert!(!w.manager.get(id).unwrap().is_unresolved());
    }

    #[test]
    fn lost_crafter_reattempts_parent_with_its_recipe() {
        let mut w = World::new();
        let old = w.colony.add_building(baker_building(1));
        let id = w.manager.create_request(
            Deliverable::craft(&ItemStack::new(bread(), 1)),
            Requester::External("player".into()),
            0,
        );
        w.dispatch();
        let child = w.manager.get(id).unwrap().children()[0];
        assert!(w.manager.get(child).unwrap().is_unresolved());

        // The crafter disappears while its ingredient request is open.
        w.colony.remove_building(old, &mut w.store).unwrap();
        let new = w.colony.add_building(baker_building(1));
        let _ = w.colony.warehouse_mut().add(&ItemStack::new(wheat(), 3));

        w.dispatch();
        assert_eq!(w.manager.state(child).unwrap(), RequestState::Completed);
        assert_eq!(w.manager.state(id).unwrap(), RequestState::Overruled);
        assert!(w.manager.get(id).unwrap().tried_recipes().is_empty());

        // The wheat went back to storage and the new baker takes the craft.
        w.dispatch();
        let request = w.manager.get(id).unwrap();
        assert_eq!(request.state(), RequestState::Assigned);
        assert_eq!(request.assignee(), Some(new));
    }

    #[test]
    fn cancel_cascades_to_open_children_only() {
        let mut w = World::new();
        w.book.insert(
            crate::recipe::RecipeDefinition::builder(rid("sandwich"), ItemStack::new(torch(), 1))
                .crafter("baker")
                .inputs([
                    ItemStack::new(wheat(), 1),
                    ItemStack::new(stick(), 1),
                    ItemStack::new(seeds(), 1),
                ])
                .build()
                .unwrap(),
        );
        w.colony.add_building(baker_building(1));
        let _ = w.colony.warehouse_mut().add(&ItemStack::new(wheat(), 1));

        let parent = w.manager.create_request(
            Deliverable::craft(&ItemStack::new(torch(), 1)),
            Requester::External("player".into()),
            0,
        );
        w.dispatch();
        let children = w.manager.get(parent).unwrap().children().to_vec();
        assert_eq!(children.len(), 3);
        let states: Vec<RequestState> =
            children.iter().map(|&c| w.manager.state(c).unwrap()).collect();
        assert_eq!(
            states.iter().filter(|&&s| s == RequestState::Completed).count(),
            1
        );

        w.cancel(parent).unwrap();
        assert_eq!(w.manager.state(parent).unwrap(), RequestState::Cancelled);
        for &child in &children {
            let state = w.manager.state(child).unwrap();
            assert!(matches!(state, RequestState::Completed | RequestState::Cancelled));
        }
        assert_eq!(
            children
                .iter()
                .filter(|&&c| w.manager.state(c).unwrap() == RequestState::Cancelled)
                .count(),
            2
        );
        assert!(w.cancel(parent).is_err());
    }

    #[test]
    fn cancelled_child_overrules_parent() {
        let mut w = World::new();
        w.colony.add_building(baker_building(1));
        let parent = w.manager.create_request(
            Deliverable::craft(&ItemStack::new(bread(), 1)),
            Requester::External("player".into()),
            0,
        );
        w.dispatch();
        let child = w.manager.get(parent).unwrap().children()[0];
        assert!(w.manager.get(child).unwrap().is_unresolved());

        w.cancel(child).unwrap();
        assert_eq!(w.manager.state(parent).unwrap(), RequestState::Overruled);
        assert_eq!(w.manager.events().count(RequestEventKind::Overruled), 1);

        // Only one bread recipe exists and it was tried.
        let report = w.dispatch();
        assert_eq!(report.unresolved, 1);
        assert_eq!(w.manager.state(parent).unwrap(), RequestState::Resolving);
    }

    #[test]
    fn higher_priority_is_served_first() {
        let mut w = World::new();
        let _ = w.colony.warehouse_mut().add(&ItemStack::new(wheat(), 3));
        let low = w.manager.create_request(
            Deliverable::stack(&ItemStack::new(wheat(), 3)),
            Requester::External("a".into()),
            0,
        );
        let high = w.manager.create_request(
            Deliverable::stack(&ItemStack::new(wheat(), 3)),
            Requester::External("b".into()),
            5,
        );
        w.dispatch();
        assert_eq!(w.manager.state(high).unwrap(), RequestState::Completed);
        assert!(w.manager.get(low).unwrap().is_unresolved());
    }

    #[test]
    fn finish_requires_assignment() {
        let mut w = World::new();
        let id = w.manager.create_request(
            Deliverable::stack(&ItemStack::new(wheat(), 1)),
            Requester::External("player".into()),
            0,
        );
        assert!(w.manager.start_action(id).is_err());
        let mut env = ColonyEnv {
            colony: &mut w.colony,
            book: &w.book,
            store: &mut w.store,
            research: &NoResearch,
        };
        assert!(w.manager.finish_action(id, &mut env).is_err());
    }

    #[test]
    fn purge_removes_finished_trees() {
        let mut w = World::new();
        let _ = w.colony.warehouse_mut().add(&ItemStack::new(wheat(), 1));
        w.manager.create_request(
            Deliverable::stack(&ItemStack::new(wheat(), 1)),
            Requester::External("player".into()),
            0,
        );
        let open = w.manager.create_request(
            Deliverable::stack(&ItemStack::new(bread(), 1)),
            Requester::External("player".into()),
            0,
        );
        w.dispatch();
        assert_eq!(w.manager.purge_finished(), 1);
        assert_eq!(w.manager.len(), 1);
        assert!(w.manager.get(open).is_some());
    }
}
