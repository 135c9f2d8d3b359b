//! The loaded set of recipe definitions, indexed by crafter.

use crate::building::Building;
use crate::colony::Colony;
use crate::gating::ColonyContext;
use crate::id::{BuildingId, RecipeToken, ResourceId};
use crate::recipe::{RecipeDefinition, RecipeDirective};
use crate::research::ResearchView;
use crate::store::RecipeStore;
use std::collections::BTreeSet;

/// What [`RecipeBook::apply`] did with a directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookChange {
    Added,
    /// A definition with the same id was replaced in place.
    Replaced,
    /// Structurally identical to a definition already held by this crafter.
    /// The new one was dropped.
    Duplicate { existing: ResourceId },
    Removed,
    /// Removal target was not present.
    Missing,
}

/// Counts from [`RecipeBook::refresh_building`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub taught: usize,
    pub forgotten: usize,
}

/// Parsed recipe definitions in declaration order.
#[derive(Debug, Default)]
pub struct RecipeBook {
    definitions: Vec<RecipeDefinition>,
}

impl RecipeBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, directive: RecipeDirective) -> BookChange {
        match directive {
            RecipeDirective::Define(def) => self.insert(def),
            RecipeDirective::Remove { id, target } => {
                if self.remove(&target).is_some() {
                    tracing::debug!(directive = %id, %target, "recipe removed");
                    BookChange::Removed
                } else {
                    tracing::debug!(directive = %id, %target, "removal target not found");
                    BookChange::Missing
                }
            }
        }
    }

    pub fn insert(&mut self, def: RecipeDefinition) -> BookChange {
        if let Some(slot) = self.definitions.iter_mut().find(|d| d.id() == def.id()) {
            *slot = def;
            return BookChange::Replaced;
        }
        let key = def.definition_key();
        if let Some(existing) = self
            .definitions
            .iter()
            .find(|d| d.crafter() == def.crafter() && d.definition_key() == key)
        {
            tracing::debug!(
                recipe = %def.id(),
                existing = %existing.id(),
                "duplicate recipe dropped"
            );
            return BookChange::Duplicate {
                existing: existing.id().clone(),
            };
        }
        self.definitions.push(def);
        BookChange::Added
    }

    pub fn remove(&mut self, id: &ResourceId) -> Option<RecipeDefinition> {
        let pos = self.definitions.iter().position(|d| d.id() == id)?;
        Some(self.definitions.remove(pos))
    }

    pub fn get(&self, id: &ResourceId) -> Option<&RecipeDefinition> {
        self.definitions.iter().find(|d| d.id() == id)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecipeDefinition> {
        self.definitions.iter()
    }

    /// Definitions for one crafter type, in declaration order.
    pub fn for_crafter<'s, 'c>(
        &'s self,
        crafter: &'c str,
    ) -> impl Iterator<Item = &'s RecipeDefinition> + use<'s, 'c> {
        self.definitions.iter().filter(move |d| d.crafter() == crafter)
    }

    /// Definitions for the building's crafter that pass gating right now.
    pub fn valid_for<'s, 'c>(
        &'s self,
        building: &'c Building,
        ctx: &'c ColonyContext<'c>,
    ) -> impl Iterator<Item = &'s RecipeDefinition> + use<'s, 'c> {
        self.for_crafter(building.crafter())
            .filter(move |d| d.is_valid_for_building(building, ctx))
    }

    /// Sync a building's held recipes with the book: teach every definition
    /// valid for it and forget the ones that stopped being valid.
    pub fn refresh_building(
        &self,
        colony: &mut Colony,
        id: BuildingId,
        research: &dyn ResearchView,
        store: &mut RecipeStore,
    ) -> RefreshSummary {
        let mut summary = RefreshSummary::default();
        let Some(building) = colony.building(id) else {
            return summary;
        };

        let (valid, invalid): (Vec<&RecipeDefinition>, Vec<&RecipeDefinition>) = {
            let ctx = ColonyContext::new(colony.id(), research, store);
            self.for_crafter(building.crafter())
                .partition(|d| d.is_valid_for_building(building, &ctx))
        };

        let mut valid_tokens = BTreeSet::new();
        for def in valid {
            let token = def.recipe_storage(store).token();
            valid_tokens.insert(token);
            if colony.add_recipe_token(id, token, store) {
                summary.taught += 1;
            }
        }

        let stale: Vec<RecipeToken> = invalid
            .iter()
            .filter_map(|d| d.bound_token(store))
            .filter(|t| !valid_tokens.contains(t))
            .collect();
        for token in stale {
            if colony.forget_recipe(id, token, store) {
                summary.forgotten += 1;
            }
        }

        if summary != RefreshSummary::default() {
            tracing::debug!(
                building = ?id,
                taught = summary.taught,
                forgotten = summary.forgotten,
                "recipes refreshed"
            );
        }
        summary
    }
}
