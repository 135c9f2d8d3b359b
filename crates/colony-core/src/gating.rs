//! Whether a recipe definition may be used by a given building.

use crate::building::Building;
use crate::id::{ColonyId, ResourceId};
use crate::item::contains_all_items;
use crate::recipe::RecipeDefinition;
use crate::research::{ResearchView, is_researched};
use crate::store::RecipeStore;

/// Read-only colony state consulted by gating checks.
#[derive(Clone, Copy)]
pub struct ColonyContext<'a> {
    pub colony: ColonyId,
    pub research: &'a dyn ResearchView,
    pub store: &'a RecipeStore,
}

impl<'a> ColonyContext<'a> {
    pub fn new(colony: ColonyId, research: &'a dyn ResearchView, store: &'a RecipeStore) -> Self {
        Self {
            colony,
            research,
            store,
        }
    }

    pub fn is_researched(&self, id: &ResourceId) -> bool {
        is_researched(self.research, self.colony, id)
    }
}

impl RecipeDefinition {
    /// Unresolved ingredients, then research, precursor and level gates.
    pub fn is_valid_for_building(&self, building: &Building, ctx: &ColonyContext<'_>) -> bool {
        if self.has_unresolved_input() {
            return false;
        }
        if let Some(required) = self.required_research()
            && !ctx.is_researched(required)
        {
            return false;
        }
        if let Some(excluded) = self.excluded_research()
            && ctx.is_researched(excluded)
        {
            return false;
        }
        if self.must_exist() && !self.has_precursor(building, ctx.store) {
            return false;
        }
        (self.min_level()..=self.max_level()).contains(&building.level())
    }

    /// Some recipe held by `building` is this recipe: same source id, or same
    /// primary output with the same set of input items.
    pub fn has_precursor(&self, building: &Building, store: &RecipeStore) -> bool {
        let inputs = self.cleaned_inputs();
        building
            .recipes()
            .iter()
            .filter_map(|&token| store.get(token))
            .any(|held| {
                if held.source() == Some(self.id()) {
                    return true;
                }
                held.primary_output().same_item(self.result())
                    && contains_all_items(held.cleaned_inputs(), &inputs)
                    && contains_all_items(&inputs, held.cleaned_inputs())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemStack;
    use crate::research::NoResearch;
    use crate::store::NewRecipe;
    use crate::test_utils::*;

    #[test]
    fn torch_level_bounds_are_inclusive() {
        let store = RecipeStore::new();
        let ctx = ColonyContext::new(ColonyId(0), &NoResearch, &store);
        let torch = torch_definition();

        for (level, expected) in [(0, false), (1, true), (3, true), (5, true), (6, false)] {
            let building = Building::worker("blacksmith", "job.blacksmith", level);
            assert_eq!(torch.is_valid_for_building(&building, &ctx), expected, "level {level}");
        }
    }

    #[test]
    fn unresolved_ingredient_never_validates() {
        let json = serde_json::json!({
            "crafter": "baker",
            "inputs": [
                { "item": "minecraft:wheat", "count": 3 },
                { "item": "othermod:sugar", "count": 2 }
            ],
            "result": "minecraft:bread"
        });
        let directive = crate::parse::parse_recipe(rid("sweet_bread"), &json, &test_registry());
        let def = match directive.unwrap() {
            crate::recipe::RecipeDirective::Define(def) => def,
            other => panic!("expected a definition, got {other:?}"),
        };
        assert!(def.has_unresolved_input());

        let mut store = RecipeStore::new();
        {
            let ctx = ColonyContext::new(ColonyId(0), &NoResearch, &store);
            assert!(!def.is_valid_for_building(&baker_building(1), &ctx));
        }

        // Not merged into the complete wheat-only bread entry.
        let sweet = def.recipe_storage(&mut store);
        let plain = bread_definition("baker").recipe_storage(&mut store);
        assert_ne!(sweet.token(), plain.token());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn required_research_fails_closed() {
        let store = RecipeStore::new();
        let def = RecipeDefinition::builder(rid("bread"), ItemStack::new(bread(), 1))
            .input(ItemStack::new(wheat(), 3))
            .research(rid("never_registered"))
            .build()
            .unwrap();
        let research = StaticResearch::default();
        let ctx = ColonyContext::new(ColonyId(0), &research, &store);
        assert!(!def.is_valid_for_building(&baker_building(1), &ctx));
    }

    #[test]
    fn required_research_by_effect_or_node() {
        let store = RecipeStore::new();
        let def = RecipeDefinition::builder(rid("bread"), ItemStack::new(bread(), 1))
            .input(ItemStack::new(wheat(), 3))
            .research(rid("baking"))
            .build()
            .unwrap();
        let building = baker_building(1);

        let mut by_effect = StaticResearch::default();
        by_effect.set_effect(ColonyId(0), rid("baking"), 1.0);
        let ctx = ColonyContext::new(ColonyId(0), &by_effect, &store);
        assert!(def.is_valid_for_building(&building, &ctx));

        let mut by_node = StaticResearch::default();
        by_node.register_node(rid("baking"));
        let ctx = ColonyContext::new(ColonyId(0), &by_node, &store);
        assert!(!def.is_valid_for_building(&building, &ctx));
        by_node.complete(ColonyId(0), rid("baking"));
        let ctx = ColonyContext::new(ColonyId(0), &by_node, &store);
        assert!(def.is_valid_for_building(&building, &ctx));
    }

    #[test]
    fn excluded_research_invalidates() {
        let store = RecipeStore::new();
        let def = RecipeDefinition::builder(rid("bread"), ItemStack::new(bread(), 1))
            .input(ItemStack::new(wheat(), 3))
            .excluded_research(rid("industrial_baking"))
            .build()
            .unwrap();
        let building = baker_building(1);

        let mut research = StaticResearch::default();
        let ctx = ColonyContext::new(ColonyId(0), &research, &store);
        assert!(def.is_valid_for_building(&building, &ctx));
        research.set_effect(ColonyId(0), rid("industrial_baking"), 0.5);
        let ctx = ColonyContext::new(ColonyId(0), &research, &store);
        assert!(!def.is_valid_for_building(&building, &ctx));
    }

    fn must_exist_bread() -> RecipeDefinition {
        RecipeDefinition::builder(rid("fancy_bread"), ItemStack::new(bread(), 2))
            .input(ItemStack::new(wheat(), 3))
            .must_exist(true)
            .build()
            .unwrap()
    }

    #[test]
    fn must_exist_without_precursor_is_invalid() {
        let store = RecipeStore::new();
        let ctx = ColonyContext::new(ColonyId(0), &NoResearch, &store);
        assert!(!must_exist_bread().is_valid_for_building(&baker_building(1), &ctx));
    }

    #[test]
    fn must_exist_matches_by_equivalent_recipe() {
        let mut colony = crate::colony::Colony::new(ColonyId(0));
        let mut store = RecipeStore::new();
        let id = colony.add_building(baker_building(1));
        // Different stack sizes, same items: counts as a precursor.
        colony
            .teach_recipe(
                id,
                NewRecipe::classic(vec![ItemStack::new(wheat(), 1)], ItemStack::new(bread(), 1)),
                &mut store,
            )
            .unwrap();

        let building = colony.building(id).unwrap();
        let ctx = ColonyContext::new(ColonyId(0), &NoResearch, &store);
        assert!(must_exist_bread().is_valid_for_building(building, &ctx));
    }

    #[test]
    fn must_exist_matches_by_source_id() {
        let mut colony = crate::colony::Colony::new(ColonyId(0));
        let mut store = RecipeStore::new();
        let id = colony.add_building(baker_building(1));
        colony
            .teach_recipe(
                id,
                NewRecipe::classic(vec![ItemStack::new(stick(), 1)], ItemStack::new(torch(), 1))
                    .with_source(rid("fancy_bread")),
                &mut store,
            )
            .unwrap();

        let building = colony.building(id).unwrap();
        let ctx = ColonyContext::new(ColonyId(0), &NoResearch, &store);
        assert!(must_exist_bread().is_valid_for_building(building, &ctx));
    }

    #[test]
    fn must_exist_rejects_different_inputs() {
        let mut colony = crate::colony::Colony::new(ColonyId(0));
        let mut store = RecipeStore::new();
        let id = colony.add_building(baker_building(1));
        colony
            .teach_recipe(
                id,
                NewRecipe::classic(
                    vec![ItemStack::new(wheat(), 3), ItemStack::new(seeds(), 1)],
                    ItemStack::new(bread(), 1),
                ),
                &mut store,
            )
            .unwrap();

        let building = colony.building(id).unwrap();
        let ctx = ColonyContext::new(ColonyId(0), &NoResearch, &store);
        assert!(!must_exist_bread().is_valid_for_building(building, &ctx));
    }
}
