//! Colony Data -- loads colony content from a directory of RON, JSON or
//! TOML files.
//!
//! # Layout
//!
//! ```text
//! <dir>/
//!   items.{ron,json,toml}     required: item and block ids
//!   config.{ron,json,toml}    optional: EngineConfig
//!   research.{ron,json,toml}  optional: research nodes and effects
//!   recipes/                  optional: one recipe per file
//! ```
//!
//! Recipe ids are `<default namespace>:<path below recipes/>`.

pub mod loader;
pub mod pack;
pub mod research;
pub mod schema;

pub use loader::DataLoadError;
pub use pack::{PackSummary, load_recipe_pack};
pub use research::load_research_tree;

use colony_core::book::RecipeBook;
use colony_core::engine::EngineConfig;
use colony_core::id::ResourceId;
use colony_core::registry::{ItemRegistry, RegistryBuilder};
use colony_research::ResearchTree;
use loader::{deserialize_file, find_data_file, require_data_file};
use schema::RegistryData;
use std::path::Path;

/// Everything loaded from one content directory.
#[derive(Debug)]
pub struct ColonyData {
    pub config: EngineConfig,
    pub items: ItemRegistry,
    pub book: RecipeBook,
    pub research: ResearchTree,
    pub pack: PackSummary,
}

/// Load an [`EngineConfig`]. Missing fields take their defaults.
pub fn load_engine_config(path: &Path) -> Result<EngineConfig, DataLoadError> {
    deserialize_file(path)
}

/// Load the item registry file.
pub fn load_item_registry(path: &Path) -> Result<ItemRegistry, DataLoadError> {
    let data: RegistryData = deserialize_file(path)?;
    let mut builder = RegistryBuilder::new();
    let invalid = |name: &str| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: format!("invalid resource id '{name}'"),
    };
    for item in &data.items {
        let id = ResourceId::parse(item.id()).ok_or_else(|| invalid(item.id()))?;
        builder.register_item(id.clone());
        if let Some(key) = item.display_key() {
            builder.set_display_key(&id, key).map_err(|_| invalid(item.id()))?;
        }
    }
    for block in &data.blocks {
        builder.block(block).map_err(|_| invalid(block))?;
    }
    Ok(builder.build())
}

/// Load a whole content directory.
pub fn load_colony_data(dir: &Path) -> Result<ColonyData, DataLoadError> {
    let config = match find_data_file(dir, "config")? {
        Some(path) => load_engine_config(&path)?,
        None => EngineConfig::default(),
    };
    let items = load_item_registry(&require_data_file(dir, "items")?)?;
    let research = match find_data_file(dir, "research")? {
        Some(path) => load_research_tree(&path, &items)?,
        None => ResearchTree::new(),
    };

    let mut book = RecipeBook::new();
    let recipes = dir.join("recipes");
    let pack = if recipes.is_dir() {
        load_recipe_pack(&recipes, &config.default_namespace, &items, &mut book)?
    } else {
        PackSummary::default()
    };

    tracing::info!(
        dir = %dir.display(),
        items = items.item_count(),
        recipes = book.len(),
        research = research.node_count(),
        "colony data loaded"
    );
    Ok(ColonyData {
        config,
        items,
        book,
        research,
        pack,
    })
}
