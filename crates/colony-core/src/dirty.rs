use crate::id::BuildingId;
use std::collections::BTreeSet;

/// Tracks which parts of a colony changed since the last dispatch pass.
///
/// Unresolved requests are only re-offered to resolvers when something that
/// could change the outcome has happened: a building was added or levelled,
/// stock moved, research completed, or a recipe was taught. Call
/// [`mark_clean`](DirtyTracker::mark_clean) after the retry pass.
#[derive(Debug, Clone, Default)]
pub struct DirtyTracker {
    dirty_buildings: BTreeSet<BuildingId>,
    inventories: bool,
    research: bool,
    recipes: bool,
    any_dirty: bool,
}

impl DirtyTracker {
    /// Create a new tracker with nothing dirty.
    pub fn new() -> Self {
        Self::default()
    }

    /// A building was added, removed or changed level.
    pub fn mark_building(&mut self, building: BuildingId) {
        self.dirty_buildings.insert(building);
        self.any_dirty = true;
    }

    /// Items moved in or out of an inventory or the warehouse.
    pub fn mark_inventories(&mut self) {
        self.inventories = true;
        self.any_dirty = true;
    }

    /// Research progress changed for this colony.
    pub fn mark_research(&mut self) {
        self.research = true;
        self.any_dirty = true;
    }

    /// A building's recipe list changed.
    pub fn mark_recipes(&mut self) {
        self.recipes = true;
        self.any_dirty = true;
    }

    /// Returns `true` if anything has been marked dirty since the last clean.
    pub fn is_dirty(&self) -> bool {
        self.any_dirty
    }

    pub fn is_building_dirty(&self, building: BuildingId) -> bool {
        self.dirty_buildings.contains(&building)
    }

    pub fn inventories_dirty(&self) -> bool {
        self.inventories
    }

    pub fn research_dirty(&self) -> bool {
        self.research
    }

    pub fn recipes_dirty(&self) -> bool {
        self.recipes
    }

    pub fn dirty_buildings(&self) -> impl Iterator<Item = BuildingId> + '_ {
        self.dirty_buildings.iter().copied()
    }

    /// Reset all flags.
    pub fn mark_clean(&mut self) {
        self.dirty_buildings.clear();
        self.inventories = false;
        self.research = false;
        self.recipes = false;
        self.any_dirty = false;
    }
}
