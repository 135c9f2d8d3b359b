//! The engine root: owns the item registry, the recipe book, the recipe
//! store and every colony with its request manager.
//!
//! # Tick
//!
//! Each [`Engine::tick`] runs dispatch for every colony. Colonies never
//! share request graphs, so they are processed independently. Within a
//! colony, dispatch repeats while passes make progress, up to
//! [`EngineConfig::max_dispatch_passes`].
//!
//! # Reload
//!
//! [`Engine::reload`] swaps in a new recipe book and replaces the store
//! wholesale. Buildings lose tokens from the old store and re-learn their
//! recipes on the next [`Engine::refresh_recipes`].

use crate::book::{RecipeBook, RefreshSummary};
use crate::building::Building;
use crate::colony::Colony;
use crate::crafting::CraftingResolver;
use crate::fixed::Ticks;
use crate::id::{BuildingId, ColonyId, DEFAULT_NAMESPACE, RecipeToken, RequestId};
use crate::manager::{ColonyEnv, DispatchReport, RequestManager};
use crate::registry::ItemRegistry;
use crate::request::{Deliverable, RequestError, Requester};
use crate::research::ResearchView;
use crate::resolver::{DisplayName, Resolver};
use crate::store::{NewRecipe, RecipeStore};
use crate::warehouse::WarehouseResolver;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Engine settings. Every field has a default, so partial config files work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Namespace for recipe ids derived from file names.
    pub default_namespace: String,
    /// Upper bound on dispatch passes per colony per tick.
    pub max_dispatch_passes: u32,
    /// Capacity of each colony's request event buffer.
    pub event_capacity: usize,
    /// Priority overrides by resolver name ("warehouse", "crafting:baker").
    pub resolver_priorities: BTreeMap<String, i32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_namespace: DEFAULT_NAMESPACE.to_string(),
            max_dispatch_passes: 4,
            event_capacity: 1024,
            resolver_priorities: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Errors and reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("unknown colony {0:?}")]
    UnknownColony(ColonyId),
    #[error("unknown building {0:?}")]
    UnknownBuilding(BuildingId),
    #[error(transparent)]
    Request(#[from] RequestError),
}

/// Summary of one engine tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: Ticks,
    pub passes: u32,
    pub dispatch: DispatchReport,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ColonySlot {
    colony: Colony,
    requests: RequestManager,
    /// Crafter types that already have a crafting resolver.
    crafters: BTreeSet<String>,
}

#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    items: ItemRegistry,
    book: RecipeBook,
    store: RecipeStore,
    colonies: BTreeMap<ColonyId, ColonySlot>,
    tick: Ticks,
}

impl Engine {
    pub fn new(items: ItemRegistry, book: RecipeBook, config: EngineConfig) -> Self {
        Self {
            config,
            items,
            book,
            store: RecipeStore::new(),
            colonies: BTreeMap::new(),
            tick: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn items(&self) -> &ItemRegistry {
        &self.items
    }

    pub fn book(&self) -> &RecipeBook {
        &self.book
    }

    pub fn store(&self) -> &RecipeStore {
        &self.store
    }

    pub fn current_tick(&self) -> Ticks {
        self.tick
    }

    // -----------------------------------------------------------------------
    // Colonies and buildings
    // -----------------------------------------------------------------------

    /// Create a colony with a warehouse resolver. Re-adding an existing id
    /// is a no-op.
    pub fn add_colony(&mut self, id: ColonyId) {
        if self.colonies.contains_key(&id) {
            return;
        }
        let mut requests = RequestManager::new(id);
        *requests.events_mut() = crate::event::RequestEventBus::new(self.config.event_capacity);
        let mut slot = ColonySlot {
            colony: Colony::new(id),
            requests,
            crafters: BTreeSet::new(),
        };
        register(&self.config, &mut slot.requests, Box::new(WarehouseResolver::new()));
        self.colonies.insert(id, slot);
    }

    pub fn colony(&self, id: ColonyId) -> Option<&Colony> {
        self.colonies.get(&id).map(|s| &s.colony)
    }

    pub fn colony_mut(&mut self, id: ColonyId) -> Option<&mut Colony> {
        self.colonies.get_mut(&id).map(|s| &mut s.colony)
    }

    pub fn requests(&self, id: ColonyId) -> Option<&RequestManager> {
        self.colonies.get(&id).map(|s| &s.requests)
    }

    pub fn requests_mut(&mut self, id: ColonyId) -> Option<&mut RequestManager> {
        self.colonies.get_mut(&id).map(|s| &mut s.requests)
    }

    pub fn colony_ids(&self) -> impl Iterator<Item = ColonyId> + '_ {
        self.colonies.keys().copied()
    }

    /// Add a building. Worker buildings get a crafting resolver for their
    /// crafter type the first time one is seen in the colony.
    pub fn add_building(
        &mut self,
        colony: ColonyId,
        building: Building,
    ) -> Result<BuildingId, EngineError> {
        let slot = self
            .colonies
            .get_mut(&colony)
            .ok_or(EngineError::UnknownColony(colony))?;
        if building.is_worker() && slot.crafters.insert(building.crafter().to_string()) {
            register(
                &self.config,
                &mut slot.requests,
                Box::new(CraftingResolver::new(building.crafter())),
            );
        }
        Ok(slot.colony.add_building(building))
    }

    /// Teach a recipe straight to a building, outside the recipe book (a
    /// player showing a worker a new recipe). Such recipes count as
    /// precursors for `must-exist` definitions.
    pub fn teach_recipe(
        &mut self,
        colony: ColonyId,
        building: BuildingId,
        recipe: NewRecipe,
    ) -> Result<RecipeToken, EngineError> {
        let slot = self
            .colonies
            .get_mut(&colony)
            .ok_or(EngineError::UnknownColony(colony))?;
        slot.colony
            .teach_recipe(building, recipe, &mut self.store)
            .ok_or(EngineError::UnknownBuilding(building))
    }

    /// Remove a building. Open requests assigned to it are overruled first so
    /// the next dispatch can hand them to another building.
    pub fn remove_building(
        &mut self,
        colony: ColonyId,
        building: BuildingId,
        research: &dyn ResearchView,
    ) -> Result<Building, EngineError> {
        let slot = self
            .colonies
            .get_mut(&colony)
            .ok_or(EngineError::UnknownColony(colony))?;
        if slot.colony.building(building).is_none() {
            return Err(EngineError::UnknownBuilding(building));
        }
        let released = {
            let mut env = ColonyEnv {
                colony: &mut slot.colony,
                book: &self.book,
                store: &mut self.store,
                research,
            };
            slot.requests.release_building(building, &mut env)?
        };
        if released > 0 {
            tracing::debug!(
                colony = colony.0,
                ?building,
                released,
                "requests released from removed building"
            );
        }
        slot.colony
            .remove_building(building, &mut self.store)
            .ok_or(EngineError::UnknownBuilding(building))
    }

    /// Sync every worker building's held recipes with the recipe book.
    pub fn refresh_recipes(
        &mut self,
        colony: ColonyId,
        research: &dyn ResearchView,
    ) -> Result<RefreshSummary, EngineError> {
        let slot = self
            .colonies
            .get_mut(&colony)
            .ok_or(EngineError::UnknownColony(colony))?;
        let workers: Vec<BuildingId> = slot
            .colony
            .buildings()
            .filter(|b| b.is_worker())
            .map(Building::id)
            .collect();
        let mut total = RefreshSummary::default();
        for id in workers {
            let summary =
                self.book
                    .refresh_building(&mut slot.colony, id, research, &mut self.store);
            total.taught += summary.taught;
            total.forgotten += summary.forgotten;
        }
        Ok(total)
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    pub fn request(
        &mut self,
        colony: ColonyId,
        deliverable: Deliverable,
        requester: Requester,
        priority: i32,
    ) -> Result<RequestId, EngineError> {
        let slot = self
            .colonies
            .get_mut(&colony)
            .ok_or(EngineError::UnknownColony(colony))?;
        Ok(slot.requests.create_request(deliverable, requester, priority))
    }

    /// Run dispatch for every colony.
    pub fn tick(&mut self, research: &dyn ResearchView) -> Result<TickReport, EngineError> {
        self.tick += 1;
        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };
        for slot in self.colonies.values_mut() {
            let mut env = ColonyEnv {
                colony: &mut slot.colony,
                book: &self.book,
                store: &mut self.store,
                research,
            };
            for _ in 0..self.config.max_dispatch_passes.max(1) {
                let pass = slot.requests.dispatch(&mut env)?;
                report.passes += 1;
                report.dispatch.attempted += pass.attempted;
                report.dispatch.assigned += pass.assigned;
                report.dispatch.completed += pass.completed;
                report.dispatch.unresolved += pass.unresolved;
                report.dispatch.created += pass.created;
                if !pass.made_progress() {
                    break;
                }
            }
            slot.requests.events_mut().deliver();
        }
        Ok(report)
    }

    pub fn start_action(
        &mut self,
        colony: ColonyId,
        request: RequestId,
    ) -> Result<(), EngineError> {
        let slot = self
            .colonies
            .get_mut(&colony)
            .ok_or(EngineError::UnknownColony(colony))?;
        Ok(slot.requests.start_action(request)?)
    }

    /// Returns `false` if the result could not be delivered and the request
    /// went back to resolving.
    pub fn finish_action(
        &mut self,
        colony: ColonyId,
        request: RequestId,
        research: &dyn ResearchView,
    ) -> Result<bool, EngineError> {
        self.with_env(colony, research, |requests, env| requests.finish_action(request, env))
    }

    pub fn cancel(
        &mut self,
        colony: ColonyId,
        request: RequestId,
        research: &dyn ResearchView,
    ) -> Result<(), EngineError> {
        self.with_env(colony, research, |requests, env| requests.cancel(request, env))
    }

    pub fn overrule(
        &mut self,
        colony: ColonyId,
        request: RequestId,
        research: &dyn ResearchView,
    ) -> Result<(), EngineError> {
        self.with_env(colony, research, |requests, env| requests.overrule(request, env))
    }

    pub fn display_name(
        &mut self,
        colony: ColonyId,
        request: RequestId,
        research: &dyn ResearchView,
    ) -> Result<Option<DisplayName>, EngineError> {
        self.with_env(colony, research, |requests, env| Ok(requests.display_name(request, env)))
    }

    fn with_env<T>(
        &mut self,
        colony: ColonyId,
        research: &dyn ResearchView,
        f: impl FnOnce(&mut RequestManager, &mut ColonyEnv<'_>) -> Result<T, RequestError>,
    ) -> Result<T, EngineError> {
        let slot = self
            .colonies
            .get_mut(&colony)
            .ok_or(EngineError::UnknownColony(colony))?;
        let mut env = ColonyEnv {
            colony: &mut slot.colony,
            book: &self.book,
            store: &mut self.store,
            research,
        };
        Ok(f(&mut slot.requests, &mut env)?)
    }

    // -----------------------------------------------------------------------
    // Reload
    // -----------------------------------------------------------------------

    /// Replace the recipe book and the store. Stale tokens are dropped from
    /// every building; memoised definition bindings rebind on next use.
    pub fn reload(&mut self, book: RecipeBook) {
        self.book = book;
        self.store.reload();
        let mut pruned = 0;
        for slot in self.colonies.values_mut() {
            pruned += slot.colony.prune_stale_recipes(&self.store);
        }
        tracing::info!(
            recipes = self.book.len(),
            epoch = self.store.epoch(),
            pruned,
            "recipe book reloaded"
        );
    }
}

fn register(config: &EngineConfig, requests: &mut RequestManager, resolver: Box<dyn Resolver>) {
    match config.resolver_priorities.get(resolver.name()).copied() {
        Some(priority) => {
            requests.register_resolver_with_priority(resolver, priority);
        }
        None => {
            requests.register_resolver(resolver);
        }
    }
}
