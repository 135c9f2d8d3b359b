use crate::building::Building;
use crate::dirty::DirtyTracker;
use crate::id::{BuildingId, ColonyId, RecipeToken};
use crate::item::Inventory;
use crate::store::{NewRecipe, RecipeStore};
use slotmap::SlotMap;

/// A colony's buildings and shared storage.
///
/// All mutation goes through methods that mark the [`DirtyTracker`], so the
/// request manager knows when unresolved requests are worth retrying.
#[derive(Debug)]
pub struct Colony {
    id: ColonyId,
    buildings: SlotMap<BuildingId, Building>,
    warehouse: Inventory,
    dirty: DirtyTracker,
}

impl Colony {
    pub fn new(id: ColonyId) -> Self {
        Self {
            id,
            buildings: SlotMap::with_key(),
            warehouse: Inventory::new(),
            dirty: DirtyTracker::new(),
        }
    }

    pub fn id(&self) -> ColonyId {
        self.id
    }

    pub fn add_building(&mut self, building: Building) -> BuildingId {
        let colony = self.id;
        let id = self.buildings.insert_with_key(|id| {
            let mut building = building;
            building.attach(id, colony);
            building
        });
        self.dirty.mark_building(id);
        id
    }

    /// Remove a building, releasing its recipe bindings.
    pub fn remove_building(&mut self, id: BuildingId, store: &mut RecipeStore) -> Option<Building> {
        let building = self.buildings.remove(id)?;
        for &token in building.recipes() {
            store.release(token);
        }
        self.dirty.mark_building(id);
        Some(building)
    }

    pub fn building(&self, id: BuildingId) -> Option<&Building> {
        self.buildings.get(id)
    }

    pub fn buildings(&self) -> impl Iterator<Item = &Building> {
        self.buildings.values()
    }

    /// Worker buildings of one crafter type, in insertion order.
    pub fn buildings_of(&self, crafter: &str) -> impl Iterator<Item = &Building> {
        self.buildings
            .values()
            .filter(move |b| b.is_worker() && b.crafter() == crafter)
    }

    pub fn building_count(&self) -> usize {
        self.buildings.len()
    }

    pub fn set_level(&mut self, id: BuildingId, level: u32) -> bool {
        let Some(building) = self.buildings.get_mut(id) else {
            return false;
        };
        building.set_level(level);
        self.dirty.mark_building(id);
        true
    }

    /// Bind a recipe into the store and add it to the building's list.
    /// Returns the token, or `None` if the building does not exist.
    pub fn teach_recipe(
        &mut self,
        id: BuildingId,
        recipe: NewRecipe,
        store: &mut RecipeStore,
    ) -> Option<RecipeToken> {
        let building = self.buildings.get_mut(id)?;
        let token = store.bind(recipe).token();
        if building.add_recipe(token) {
            store.register_use(token);
            self.dirty.mark_recipes();
        }
        Some(token)
    }

    /// Add an already stored recipe token to a building.
    pub fn add_recipe_token(
        &mut self,
        id: BuildingId,
        token: RecipeToken,
        store: &mut RecipeStore,
    ) -> bool {
        let Some(building) = self.buildings.get_mut(id) else {
            return false;
        };
        if !store.contains(token) || !building.add_recipe(token) {
            return false;
        }
        store.register_use(token);
        self.dirty.mark_recipes();
        true
    }

    pub fn forget_recipe(
        &mut self,
        id: BuildingId,
        token: RecipeToken,
        store: &mut RecipeStore,
    ) -> bool {
        let Some(building) = self.buildings.get_mut(id) else {
            return false;
        };
        if !building.remove_recipe(token) {
            return false;
        }
        store.release(token);
        self.dirty.mark_recipes();
        true
    }

    /// Drop held tokens that no longer resolve in `store` (after a reload).
    pub fn prune_stale_recipes(&mut self, store: &RecipeStore) -> usize {
        let mut pruned = 0;
        for building in self.buildings.values_mut() {
            pruned += building.retain_recipes(|t| store.contains(t)).len();
        }
        if pruned > 0 {
            self.dirty.mark_recipes();
        }
        pruned
    }

    pub fn warehouse(&self) -> &Inventory {
        &self.warehouse
    }

    /// Mutable warehouse access. Marks inventories dirty.
    pub fn warehouse_mut(&mut self) -> &mut Inventory {
        self.dirty.mark_inventories();
        &mut self.warehouse
    }

    /// Mutable inventory access for a building. Marks inventories dirty.
    pub fn inventory_mut(&mut self, id: BuildingId) -> Option<&mut Inventory> {
        let building = self.buildings.get_mut(id)?;
        self.dirty.mark_inventories();
        Some(&mut building.inventory)
    }

    /// Mutable building access for request-system internals.
    pub(crate) fn building_mut(&mut self, id: BuildingId) -> Option<&mut Building> {
        self.buildings.get_mut(id)
    }

    pub fn dirty(&self) -> &DirtyTracker {
        &self.dirty
    }

    /// Flag research progress as changed (called by the research host).
    pub fn mark_research_changed(&mut self) {
        self.dirty.mark_research();
    }

    pub(crate) fn dirty_mut(&mut self) -> &mut DirtyTracker {
        &mut self.dirty
    }
}
