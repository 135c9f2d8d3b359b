//! Research tree loading.

use crate::loader::{DataLoadError, deserialize_file};
use crate::schema::{ResearchCostData, ResearchData, ResearchFileData};
use colony_core::fixed::f64_to_fixed64;
use colony_core::id::ResourceId;
use colony_core::item::ItemStack;
use colony_core::registry::ItemRegistry;
use colony_research::{EffectGrant, ResearchCost, ResearchNode, ResearchTree};
use std::path::Path;

fn resolve_id(text: &str, file: &Path, expected_kind: &'static str) -> Result<ResourceId, DataLoadError> {
    ResourceId::parse(text).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: text.to_string(),
        expected_kind,
    })
}

fn resolve_cost(data: &ResearchCostData, registry: &ItemRegistry, file: &Path) -> Result<ResearchCost, DataLoadError> {
    match data {
        ResearchCostData::Free => Ok(ResearchCost::Free),
        ResearchCostData::Points { amount } => Ok(ResearchCost::Points(*amount)),
        ResearchCostData::Items { items } => {
            let stacks = items
                .iter()
                .map(|(name, count)| {
                    let kind = ResourceId::parse(name)
                        .and_then(|id| registry.item(&id))
                        .ok_or_else(|| DataLoadError::UnresolvedRef {
                            file: file.to_path_buf(),
                            name: name.clone(),
                            expected_kind: "item",
                        })?;
                    Ok(ItemStack::new(kind, *count))
                })
                .collect::<Result<Vec<_>, DataLoadError>>()?;
            Ok(ResearchCost::Items(stacks))
        }
    }
}

fn resolve_node(data: ResearchData, registry: &ItemRegistry, file: &Path) -> Result<ResearchNode, DataLoadError> {
    let id = resolve_id(&data.id, file, "research")?;
    let prerequisites = data
        .prerequisites
        .iter()
        .map(|p| resolve_id(p, file, "research"))
        .collect::<Result<Vec<_>, _>>()?;
    let effects = data
        .effects
        .iter()
        .map(|e| {
            Ok(EffectGrant {
                effect: resolve_id(&e.effect, file, "effect")?,
                strength: f64_to_fixed64(e.strength),
            })
        })
        .collect::<Result<Vec<_>, DataLoadError>>()?;
    Ok(ResearchNode {
        name: data.name.unwrap_or_else(|| id.to_string()),
        cost: resolve_cost(&data.cost, registry, file)?,
        id,
        prerequisites,
        effects,
    })
}

/// Load a research file into a tree. Nodes must be listed after their
/// prerequisites.
pub fn load_research_tree(path: &Path, registry: &ItemRegistry) -> Result<ResearchTree, DataLoadError> {
    let data: ResearchFileData = deserialize_file(path)?;
    let mut tree = ResearchTree::new();
    for node in data.research {
        let node = resolve_node(node, registry, path)?;
        tree.register(node).map_err(|source| DataLoadError::Research {
            file: path.to_path_buf(),
            source,
        })?;
    }
    for effect in &data.effects {
        tree.register_effect(resolve_id(effect, path, "effect")?);
    }
    tracing::info!(file = %path.display(), nodes = tree.node_count(), "research tree loaded");
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::tests::{cleanup, make_test_dir};
    use colony_core::test_utils::*;
    use colony_research::ResearchError;
    use std::fs;

    #[test]
    fn loads_nodes_costs_and_effects() {
        let dir = make_test_dir("research_load");
        let path = dir.join("research.ron");
        fs::write(
            &path,
            r#"(
                research: [
                    (id: "colony:bakery_basics", cost: Points(amount: 100),
                     effects: [(effect: "colony:bakery_unlock", strength: 0.5)]),
                    (id: "colony:stonecake", prerequisites: ["colony:bakery_basics"],
                     cost: Items(items: [("minecraft:wheat", 16)])),
                ],
                effects: ["colony:citizen_happiness"],
            )"#,
        )
        .unwrap();

        let tree = load_research_tree(&path, &test_registry()).unwrap();
        assert_eq!(tree.node_count(), 2);
        let stonecake = tree.node(&rid("stonecake")).unwrap();
        assert_eq!(stonecake.cost, ResearchCost::Items(vec![ItemStack::new(wheat(), 16)]));
        assert_eq!(stonecake.name, "colony:stonecake");
        assert!(tree.has_effect(&rid("bakery_unlock")));
        assert!(tree.has_effect(&rid("citizen_happiness")));

        cleanup(&dir);
    }

    #[test]
    fn unknown_cost_item_is_unresolved() {
        let dir = make_test_dir("research_bad_item");
        let path = dir.join("research.json");
        fs::write(
            &path,
            r#"{ "research": [ { "id": "colony:rye", "cost": { "Items": { "items": [["minecraft:rye", 1]] } } } ] }"#,
        )
        .unwrap();

        let err = load_research_tree(&path, &test_registry()).unwrap_err();
        assert!(matches!(err, DataLoadError::UnresolvedRef { expected_kind: "item", .. }));

        cleanup(&dir);
    }

    #[test]
    fn prerequisites_must_come_first() {
        let dir = make_test_dir("research_order");
        let path = dir.join("research.json");
        fs::write(
            &path,
            r#"{ "research": [
                { "id": "colony:stonecake", "prerequisites": ["colony:bakery_basics"] },
                { "id": "colony:bakery_basics" }
            ] }"#,
        )
        .unwrap();

        let err = load_research_tree(&path, &test_registry()).unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::Research {
                source: ResearchError::InvalidPrerequisite { .. },
                ..
            }
        ));

        cleanup(&dir);
    }
}
