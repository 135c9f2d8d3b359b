//! Research for colonies: a global tree of research nodes and the effects
//! they grant, plus per-colony progress.
//!
//! # Overview
//!
//! Nodes are registered at startup via [`ResearchTree::register`]. Each
//! [`ResearchNode`] has prerequisites, a [`ResearchCost`] and a list of
//! [`EffectGrant`]s. Effects can also be registered on their own with
//! [`ResearchTree::register_effect`] and driven by game code.
//!
//! At runtime, game code drives research per colony through
//! [`ResearchManager::start_research`] and
//! [`ResearchManager::contribute_points`] /
//! [`ResearchManager::contribute_items`]. Completing a node adds its effect
//! strengths to the colony and emits [`ResearchEvent::Completed`]; callers
//! should mark the colony dirty so unresolved requests are retried.
//!
//! # Recipe gating
//!
//! [`ResearchManager`] implements the core [`ResearchView`], so it can be
//! passed straight to `Engine::tick` and recipe validity checks. An id
//! counts as researched when a registered effect has positive strength in
//! the colony or a registered node has been completed there.

use colony_core::fixed::{Fixed64, Ticks};
use colony_core::id::{ColonyId, ResourceId};
use colony_core::item::{Inventory, ItemStack};
use colony_core::research::ResearchView;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

// ---------------------------------------------------------------------------
// Costs and effects
// ---------------------------------------------------------------------------

/// How a node's research cost is paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResearchCost {
    /// Free: completes as soon as it is started.
    Free,

    /// Accumulate research points, e.g. from a university's scholars.
    Points(u32),

    /// Hand over items from colony storage. All of each stack is required.
    Items(Vec<ItemStack>),
}

/// An effect a node grants on completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectGrant {
    pub effect: ResourceId,
    /// Added to the colony's current strength of `effect`.
    pub strength: Fixed64,
}

// ---------------------------------------------------------------------------
// Node definition
// ---------------------------------------------------------------------------

/// A research node. Registered at startup; immutable after registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchNode {
    /// Unique identifier, also used by recipe `research-id` gating.
    pub id: ResourceId,

    /// Translation key or human-readable name.
    pub name: String,

    /// Nodes that must be completed before this one can start.
    #[serde(default)]
    pub prerequisites: Vec<ResourceId>,

    pub cost: ResearchCost,

    #[serde(default)]
    pub effects: Vec<EffectGrant>,
}

// ---------------------------------------------------------------------------
// Research state (runtime)
// ---------------------------------------------------------------------------

/// Where one colony stands on one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResearchState {
    NotStarted,

    /// Progress depends on the cost model.
    InProgress(ResearchProgress),

    Completed { tick: Ticks },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResearchProgress {
    Points(u32),

    /// Amount handed over so far, per cost stack.
    Items(Vec<u32>),
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResearchEvent {
    Started {
        colony: ColonyId,
        node: ResourceId,
        tick: Ticks,
    },
    Completed {
        colony: ColonyId,
        node: ResourceId,
        tick: Ticks,
    },
    /// A completed node was undone and its effects withdrawn.
    Reset {
        colony: ColonyId,
        node: ResourceId,
        tick: Ticks,
    },
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResearchError {
    #[error("research node not found: {0}")]
    NodeNotFound(ResourceId),

    #[error("duplicate research node: {0}")]
    DuplicateNode(ResourceId),

    #[error("prerequisite {prereq} for research node {node} does not exist")]
    InvalidPrerequisite { node: ResourceId, prereq: ResourceId },

    #[error("prerequisite not met: {node} requires {prereq}")]
    PrerequisiteNotMet { node: ResourceId, prereq: ResourceId },

    #[error("research {0} is already in progress")]
    AlreadyInProgress(ResourceId),

    #[error("research {0} is already completed")]
    AlreadyCompleted(ResourceId),

    #[error("research {0} is not in progress")]
    NotInProgress(ResourceId),

    #[error("research {0} is not completed")]
    NotCompleted(ResourceId),

    #[error("research {node} is required by completed research {dependent}")]
    HasDependents { node: ResourceId, dependent: ResourceId },

    #[error("wrong cost model for research {0}: expected {1}")]
    WrongCostModel(ResourceId, &'static str),
}

// ---------------------------------------------------------------------------
// ResearchTree -- global definitions
// ---------------------------------------------------------------------------

/// Every research node and effect known to the game.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchTree {
    nodes: BTreeMap<ResourceId, ResearchNode>,
    effects: BTreeSet<ResourceId>,
}

impl ResearchTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node. Prerequisites must already be registered, which
    /// also keeps the tree acyclic. The node's effects are registered too.
    pub fn register(&mut self, node: ResearchNode) -> Result<(), ResearchError> {
        if self.nodes.contains_key(&node.id) {
            return Err(ResearchError::DuplicateNode(node.id));
        }
        if let Some(prereq) = node.prerequisites.iter().find(|p| !self.nodes.contains_key(*p)) {
            return Err(ResearchError::InvalidPrerequisite {
                node: node.id.clone(),
                prereq: prereq.clone(),
            });
        }
        for grant in &node.effects {
            self.effects.insert(grant.effect.clone());
        }
        tracing::debug!(node = %node.id, effects = node.effects.len(), "research node registered");
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Register an effect that no node grants. Its strength is set by game
    /// code through [`ResearchManager::set_effect_strength`].
    pub fn register_effect(&mut self, effect: ResourceId) {
        self.effects.insert(effect);
    }

    pub fn node(&self, id: &ResourceId) -> Option<&ResearchNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ResearchNode> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn has_node(&self, id: &ResourceId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn has_effect(&self, id: &ResourceId) -> bool {
        self.effects.contains(id)
    }

    fn node_or_err(&self, id: &ResourceId) -> Result<&ResearchNode, ResearchError> {
        self.nodes.get(id).ok_or_else(|| ResearchError::NodeNotFound(id.clone()))
    }
}

// ---------------------------------------------------------------------------
// Per-colony progress
// ---------------------------------------------------------------------------

/// Research progress and effect strengths of one colony.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColonyResearch {
    states: HashMap<ResourceId, ResearchState>,
    effects: HashMap<ResourceId, Fixed64>,
}

impl ColonyResearch {
    pub fn state(&self, id: &ResourceId) -> &ResearchState {
        self.states.get(id).unwrap_or(&ResearchState::NotStarted)
    }

    pub fn is_completed(&self, id: &ResourceId) -> bool {
        matches!(self.states.get(id), Some(ResearchState::Completed { .. }))
    }

    pub fn is_in_progress(&self, id: &ResourceId) -> bool {
        matches!(self.states.get(id), Some(ResearchState::InProgress(_)))
    }

    pub fn effect_strength(&self, id: &ResourceId) -> Fixed64 {
        self.effects.get(id).copied().unwrap_or(Fixed64::ZERO)
    }

    pub fn completed(&self) -> impl Iterator<Item = &ResourceId> {
        self.states
            .iter()
            .filter(|(_, s)| matches!(s, ResearchState::Completed { .. }))
            .map(|(id, _)| id)
    }
}

// ---------------------------------------------------------------------------
// ResearchManager
// ---------------------------------------------------------------------------

/// The research tree plus every colony's progress.
///
/// Colonies are created lazily on first use. Events accumulate until
/// [`drain_events`](Self::drain_events).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchManager {
    tree: ResearchTree,
    colonies: BTreeMap<ColonyId, ColonyResearch>,

    /// Events emitted since last drain. Not serialized (transient).
    #[serde(skip)]
    events: Vec<ResearchEvent>,
}

impl ResearchManager {
    pub fn new(tree: ResearchTree) -> Self {
        Self {
            tree,
            colonies: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    pub fn tree(&self) -> &ResearchTree {
        &self.tree
    }

    /// Progress of `colony`. `None` if it never researched anything.
    pub fn colony(&self, colony: ColonyId) -> Option<&ColonyResearch> {
        self.colonies.get(&colony)
    }

    pub fn state(&self, colony: ColonyId, id: &ResourceId) -> ResearchState {
        self.colonies
            .get(&colony)
            .map_or(ResearchState::NotStarted, |c| c.state(id).clone())
    }

    pub fn is_completed(&self, colony: ColonyId, id: &ResourceId) -> bool {
        self.colonies.get(&colony).is_some_and(|c| c.is_completed(id))
    }

    /// Set an effect's strength directly, for effects no node grants.
    pub fn set_effect_strength(&mut self, colony: ColonyId, effect: ResourceId, strength: Fixed64) {
        self.tree.register_effect(effect.clone());
        self.colonies.entry(colony).or_default().effects.insert(effect, strength);
    }

    // -- Research actions --

    /// Start researching a node in `colony`. Free nodes complete at once.
    pub fn start_research(&mut self, colony: ColonyId, id: &ResourceId, tick: Ticks) -> Result<(), ResearchError> {
        let node = self.tree.node_or_err(id)?;
        let progress = self.colonies.entry(colony).or_default();
        if let Some(prereq) = node.prerequisites.iter().find(|p| !progress.is_completed(p)) {
            return Err(ResearchError::PrerequisiteNotMet {
                node: id.clone(),
                prereq: prereq.clone(),
            });
        }
        match progress.state(id) {
            ResearchState::InProgress(_) => return Err(ResearchError::AlreadyInProgress(id.clone())),
            ResearchState::Completed { .. } => return Err(ResearchError::AlreadyCompleted(id.clone())),
            ResearchState::NotStarted => {}
        }

        let initial = match &node.cost {
            ResearchCost::Free => None,
            ResearchCost::Points(_) => Some(ResearchProgress::Points(0)),
            ResearchCost::Items(stacks) => Some(ResearchProgress::Items(vec![0; stacks.len()])),
        };
        self.events.push(ResearchEvent::Started {
            colony,
            node: id.clone(),
            tick,
        });
        match initial {
            Some(p) => {
                progress.states.insert(id.clone(), ResearchState::InProgress(p));
            }
            None => self.complete(colony, id, tick)?,
        }
        Ok(())
    }

    /// Contribute points toward a Points-cost node. Returns the number of
    /// points actually used; completes the node when the target is met.
    pub fn contribute_points(
        &mut self,
        colony: ColonyId,
        id: &ResourceId,
        points: u32,
        tick: Ticks,
    ) -> Result<u32, ResearchError> {
        let ResearchCost::Points(required) = self.tree.node_or_err(id)?.cost else {
            return Err(ResearchError::WrongCostModel(id.clone(), "Points"));
        };
        let current = match self.colonies.get_mut(&colony).and_then(|c| c.states.get_mut(id)) {
            Some(ResearchState::InProgress(ResearchProgress::Points(p))) => p,
            _ => return Err(ResearchError::NotInProgress(id.clone())),
        };
        let used = points.min(required.saturating_sub(*current));
        *current += used;
        if *current >= required {
            self.complete(colony, id, tick)?;
        }
        Ok(used)
    }

    /// Hand over items from `storage` toward an Items-cost node. Takes only
    /// what is still missing. Returns the total number of items taken;
    /// completes the node when every stack is fully paid.
    pub fn contribute_items(
        &mut self,
        colony: ColonyId,
        id: &ResourceId,
        storage: &mut Inventory,
        tick: Ticks,
    ) -> Result<u32, ResearchError> {
        let ResearchCost::Items(cost) = &self.tree.node_or_err(id)?.cost else {
            return Err(ResearchError::WrongCostModel(id.clone(), "Items"));
        };
        let paid = match self.colonies.get_mut(&colony).and_then(|c| c.states.get_mut(id)) {
            Some(ResearchState::InProgress(ResearchProgress::Items(paid))) => paid,
            _ => return Err(ResearchError::NotInProgress(id.clone())),
        };
        let mut taken = 0;
        for (stack, paid) in cost.iter().zip(paid.iter_mut()) {
            let missing = stack.count.saturating_sub(*paid);
            let removed = storage.remove(stack, missing);
            *paid += removed;
            taken += removed;
        }
        let done = cost.iter().zip(paid.iter()).all(|(stack, &paid)| paid >= stack.count);
        if done {
            self.complete(colony, id, tick)?;
        }
        Ok(taken)
    }

    /// Mark a node completed regardless of its cost and grant its effects.
    pub fn complete(&mut self, colony: ColonyId, id: &ResourceId, tick: Ticks) -> Result<(), ResearchError> {
        let node = self.tree.node_or_err(id)?;
        let progress = self.colonies.entry(colony).or_default();
        if progress.is_completed(id) {
            return Err(ResearchError::AlreadyCompleted(id.clone()));
        }
        progress.states.insert(id.clone(), ResearchState::Completed { tick });
        for grant in &node.effects {
            let strength = progress.effects.entry(grant.effect.clone()).or_insert(Fixed64::ZERO);
            *strength = strength.saturating_add(grant.strength);
        }
        tracing::info!(colony = colony.0, node = %id, "research completed");
        self.events.push(ResearchEvent::Completed {
            colony,
            node: id.clone(),
            tick,
        });
        Ok(())
    }

    /// Undo a completed node and withdraw its effects. Refused while another
    /// completed node lists it as a prerequisite.
    pub fn reset(&mut self, colony: ColonyId, id: &ResourceId, tick: Ticks) -> Result<(), ResearchError> {
        let node = self.tree.node_or_err(id)?;
        let progress = self
            .colonies
            .get_mut(&colony)
            .filter(|c| c.is_completed(id))
            .ok_or_else(|| ResearchError::NotCompleted(id.clone()))?;
        if let Some(dependent) = self
            .tree
            .nodes()
            .find(|n| n.prerequisites.contains(id) && progress.is_completed(&n.id))
        {
            return Err(ResearchError::HasDependents {
                node: id.clone(),
                dependent: dependent.id.clone(),
            });
        }
        progress.states.remove(id);
        for grant in &node.effects {
            if let Some(strength) = progress.effects.get_mut(&grant.effect) {
                *strength = strength.saturating_sub(grant.strength).max(Fixed64::ZERO);
            }
        }
        self.events.push(ResearchEvent::Reset {
            colony,
            node: id.clone(),
            tick,
        });
        Ok(())
    }

    // -- Event API --

    /// Drain all pending events.
    pub fn drain_events(&mut self) -> Vec<ResearchEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn pending_events(&self) -> &[ResearchEvent] {
        &self.events
    }
}

impl ResearchView for ResearchManager {
    fn has_research_effect(&self, id: &ResourceId) -> bool {
        self.tree.has_effect(id)
    }

    fn has_research(&self, id: &ResourceId) -> bool {
        self.tree.has_node(id)
    }

    fn effect_strength(&self, colony: ColonyId, id: &ResourceId) -> Fixed64 {
        self.colonies
            .get(&colony)
            .map_or(Fixed64::ZERO, |c| c.effect_strength(id))
    }

    fn has_completed_research(&self, colony: ColonyId, id: &ResourceId) -> bool {
        self.is_completed(colony, id)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
