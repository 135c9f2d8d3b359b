//! Shared test helpers for unit tests, integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so downstream
//! crates can enable them through the `test-utils` feature.

use crate::building::Building;
use crate::fixed::{Fixed64, f64_to_fixed64};
use crate::id::{BlockKind, ColonyId, ItemKind, ResourceId};
use crate::item::ItemStack;
use crate::recipe::{RecipeBuilder, RecipeDefinition};
use crate::registry::{ItemRegistry, RegistryBuilder};
use crate::research::ResearchView;
use crate::store::NewRecipe;
use std::collections::{HashMap, HashSet};

// ===========================================================================
// Ids and registry
// ===========================================================================

/// A recipe or research id in the `colony` namespace.
pub fn rid(path: &str) -> ResourceId {
    ResourceId::new("colony", path)
}

/// Registry with the vanilla items the fixtures use. Registration order
/// fixes the kinds returned by the item helpers below.
pub fn test_registry() -> ItemRegistry {
    let mut builder = RegistryBuilder::new();
    for path in [
        "wheat",
        "bread",
        "wheat_seeds",
        "stick",
        "torch",
        "oak_log",
        "oak_planks",
        "potion",
    ] {
        builder.register_item(ResourceId::new("minecraft", path));
    }
    builder.register_block(ResourceId::new("minecraft", "furnace"));
    builder.build()
}

// ===========================================================================
// Item constructors
// ===========================================================================

pub fn wheat() -> ItemKind {
    ItemKind(1)
}
pub fn bread() -> ItemKind {
    ItemKind(2)
}
pub fn seeds() -> ItemKind {
    ItemKind(3)
}
pub fn stick() -> ItemKind {
    ItemKind(4)
}
pub fn torch() -> ItemKind {
    ItemKind(5)
}
pub fn log() -> ItemKind {
    ItemKind(6)
}
pub fn planks() -> ItemKind {
    ItemKind(7)
}
pub fn potion() -> ItemKind {
    ItemKind(8)
}

pub fn furnace() -> BlockKind {
    BlockKind(1)
}

// ===========================================================================
// Recipe fixtures
// ===========================================================================

/// `colony:bread`: three wheat into one bread.
pub fn bread_definition(crafter: &str) -> RecipeDefinition {
    RecipeBuilder::new(rid("bread"), ItemStack::new(bread(), 1))
        .crafter(crafter)
        .input(ItemStack::new(wheat(), 3))
        .build()
        .expect("bread fixture is well formed")
}

/// `colony:torch`: two sticks into four torches at blacksmith levels 1..=5.
pub fn torch_definition() -> RecipeDefinition {
    RecipeBuilder::new(rid("torch"), ItemStack::new(torch(), 4))
        .crafter("blacksmith")
        .input(ItemStack::new(stick(), 2))
        .levels(1, 5)
        .build()
        .expect("torch fixture is well formed")
}

pub fn bread_new_recipe() -> NewRecipe {
    NewRecipe::classic(vec![ItemStack::new(wheat(), 3)], ItemStack::new(bread(), 1))
}

pub fn baker_building(level: u32) -> Building {
    Building::worker("baker", "com.colony.job.Baker", level)
}

// ===========================================================================
// Research
// ===========================================================================

/// Hand-filled research view.
#[derive(Debug, Clone, Default)]
pub struct StaticResearch {
    effects: HashSet<ResourceId>,
    strengths: HashMap<(ColonyId, ResourceId), Fixed64>,
    nodes: HashSet<ResourceId>,
    completed: HashSet<(ColonyId, ResourceId)>,
}

impl StaticResearch {
    /// Register an effect and set its strength in one colony.
    pub fn set_effect(&mut self, colony: ColonyId, id: ResourceId, strength: f64) {
        self.effects.insert(id.clone());
        self.strengths.insert((colony, id), f64_to_fixed64(strength));
    }

    pub fn register_node(&mut self, id: ResourceId) {
        self.nodes.insert(id);
    }

    /// Register the node if needed and mark it completed in `colony`.
    pub fn complete(&mut self, colony: ColonyId, id: ResourceId) {
        self.nodes.insert(id.clone());
        self.completed.insert((colony, id));
    }
}

impl ResearchView for StaticResearch {
    fn has_research_effect(&self, id: &ResourceId) -> bool {
        self.effects.contains(id)
    }

    fn has_research(&self, id: &ResourceId) -> bool {
        self.nodes.contains(id)
    }

    fn effect_strength(&self, colony: ColonyId, id: &ResourceId) -> Fixed64 {
        self.strengths
            .get(&(colony, id.clone()))
            .copied()
            .unwrap_or(Fixed64::ZERO)
    }

    fn has_completed_research(&self, colony: ColonyId, id: &ResourceId) -> bool {
        self.completed.contains(&(colony, id.clone()))
    }
}
