//! Serde data file structs for colony content.
//!
//! These structs define the on-disk format for the item registry and the
//! research tree. They are deserialized from RON, JSON, or TOML data files
//! and then resolved into core types by the loader. Recipe files are not
//! described here; they go through the core recipe parser.

use serde::Deserialize;

// ===========================================================================
// Items
// ===========================================================================

/// The item registry file. Every list may be omitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegistryData {
    pub items: Vec<ItemData>,
    /// Block ids, e.g. crafting stations used as intermediates.
    pub blocks: Vec<String>,
}

/// An item in the registry file: either a bare id or an id with a custom
/// display key.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ItemData {
    Short(String),
    Full {
        id: String,
        #[serde(default)]
        display_key: Option<String>,
    },
}

impl ItemData {
    pub fn id(&self) -> &str {
        match self {
            ItemData::Short(id) | ItemData::Full { id, .. } => id,
        }
    }

    pub fn display_key(&self) -> Option<&str> {
        match self {
            ItemData::Short(_) => None,
            ItemData::Full { display_key, .. } => display_key.as_deref(),
        }
    }
}

// ===========================================================================
// Research
// ===========================================================================

/// The research file: nodes in dependency order plus standalone effects.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResearchFileData {
    pub research: Vec<ResearchData>,
    /// Effects granted by game code rather than by a node.
    pub effects: Vec<String>,
}

/// A research node definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct ResearchData {
    pub id: String,
    /// Translation key. Defaults to the id.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cost: ResearchCostData,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub effects: Vec<EffectData>,
}

/// How a node's research cost is paid.
#[derive(Debug, Clone, Default, Deserialize)]
pub enum ResearchCostData {
    #[default]
    Free,
    Points { amount: u32 },
    /// `(item reference, count)` pairs.
    Items { items: Vec<(String, u32)> },
}

/// An effect granted on completion.
#[derive(Debug, Clone, Deserialize)]
pub struct EffectData {
    pub effect: String,
    #[serde(default = "default_strength")]
    pub strength: f64,
}

fn default_strength() -> f64 {
    1.0
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_ron_mixes_short_and_full_items() {
        let ron = r#"(
            items: [
                "minecraft:wheat",
                (id: "minecraft:bread", display_key: "item.colony.loaf"),
            ],
            blocks: ["minecraft:furnace"],
        )"#;
        let data: RegistryData = ron::from_str(ron).unwrap();
        assert_eq!(data.items.len(), 2);
        assert_eq!(data.items[0].id(), "minecraft:wheat");
        assert_eq!(data.items[0].display_key(), None);
        assert_eq!(data.items[1].display_key(), Some("item.colony.loaf"));
        assert_eq!(data.blocks, vec!["minecraft:furnace".to_string()]);
    }

    #[test]
    fn registry_json_lists_default_to_empty() {
        let data: RegistryData = serde_json::from_str(r#"{ "items": ["wheat"] }"#).unwrap();
        assert_eq!(data.items.len(), 1);
        assert!(data.blocks.is_empty());
    }

    #[test]
    fn research_ron_cost_variants() {
        let ron = r#"(
            research: [
                (id: "colony:bakery_basics", cost: Points(amount: 100),
                 effects: [(effect: "colony:bakery_unlock")]),
                (id: "colony:stonecake", prerequisites: ["colony:bakery_basics"],
                 cost: Items(items: [("minecraft:wheat", 16)])),
                (id: "colony:free_lunch"),
            ],
        )"#;
        let data: ResearchFileData = ron::from_str(ron).unwrap();
        assert_eq!(data.research.len(), 3);
        assert!(matches!(data.research[0].cost, ResearchCostData::Points { amount: 100 }));
        assert_eq!(data.research[0].effects[0].strength, 1.0);
        match &data.research[1].cost {
            ResearchCostData::Items { items } => assert_eq!(items[0], ("minecraft:wheat".to_string(), 16)),
            other => panic!("unexpected cost {other:?}"),
        }
        assert!(matches!(data.research[2].cost, ResearchCostData::Free));
        assert!(data.effects.is_empty());
    }

    #[test]
    fn research_toml_with_standalone_effects() {
        let toml_str = r#"
effects = ["colony:citizen_happiness"]

[[research]]
id = "colony:bakery_basics"
name = "com.colony.research.bakery_basics"

[research.cost.Points]
amount = 50
"#;
        let data: ResearchFileData = toml::from_str(toml_str).unwrap();
        assert_eq!(data.effects, vec!["colony:citizen_happiness".to_string()]);
        assert_eq!(data.research[0].name.as_deref(), Some("com.colony.research.bakery_basics"));
        assert!(matches!(data.research[0].cost, ResearchCostData::Points { amount: 50 }));
    }
}
