//! End-to-end tests for a colony loaded from a content directory.
//!
//! Writes a small content directory (items, config, research and a recipe
//! pack in all three formats), loads it with `colony-data`, and runs the
//! engine on the result.

use colony_core::book::RecipeBook;
use colony_core::building::Building;
use colony_core::engine::Engine;
use colony_core::id::{ColonyId, ItemKind, RequestId, ResourceId};
use colony_core::item::ItemStack;
use colony_core::registry::ItemRegistry;
use colony_core::request::{Deliverable, RequestState, Requester};
use colony_core::store::NewRecipe;
use colony_data::{ColonyData, load_colony_data, load_recipe_pack};
use colony_research::ResearchManager;
use std::fs;
use std::path::{Path, PathBuf};

const COLONY: ColonyId = ColonyId(1);

// ===========================================================================
// Content directory
// ===========================================================================

struct ContentDir(PathBuf);

impl ContentDir {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("colony_it_{name}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("recipes/baker")).unwrap();
        fs::create_dir_all(dir.join("recipes/blacksmith")).unwrap();
        Self(dir)
    }

    fn write(&self, relative: &str, content: &str) {
        fs::write(self.0.join(relative), content).unwrap();
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for ContentDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

fn write_content(dir: &ContentDir) {
    dir.write(
        "items.ron",
        r#"(
            items: [
                "minecraft:wheat",
                "minecraft:wheat_seeds",
                "minecraft:bread",
                "minecraft:oak_planks",
                "minecraft:stick",
                "minecraft:torch",
            ],
        )"#,
    );
    dir.write(
        "config.toml",
        r#"
default_namespace = "colony"
max_dispatch_passes = 8

[resolver_priorities]
"crafting:carpenter" = 150
"#,
    );
    dir.write(
        "research.json",
        r#"{
            "research": [
                {
                    "id": "colony:bakery_basics",
                    "cost": { "Points": { "amount": 10 } },
                    "effects": [{ "effect": "colony:bakery_unlock" }]
                }
            ]
        }"#,
    );
    dir.write(
        "recipes/blacksmith/torch.json",
        r#"{
            "crafter": "blacksmith",
            "inputs": [{ "item": "minecraft:stick", "count": 2 }],
            "result": "minecraft:torch",
            "count": 4,
            "min-building-level": 1,
            "max-building-level": 5
        }"#,
    );
    dir.write(
        "recipes/stick.ron",
        r#"{
            "crafter": "carpenter",
            "inputs": [(item: "minecraft:oak_planks", count: 2)],
            "result": "minecraft:stick",
            "count": 4,
        }"#,
    );
    dir.write(
        "recipes/baker/bread.toml",
        r#"
crafter = "baker"
result = "minecraft:bread"
research-id = "colony:bakery_unlock"

[[inputs]]
item = "minecraft:wheat"
count = 3
"#,
    );
    dir.write(
        "recipes/baker/seeded_bread.json",
        r#"{
            "crafter": "baker",
            "inputs": [{ "item": "minecraft:wheat", "count": 3 }],
            "result": "minecraft:bread",
            "additional-output": [{ "item": "minecraft:wheat_seeds", "count": 1 }],
            "must-exist": true
        }"#,
    );
}

fn load(name: &str) -> (ContentDir, ColonyData) {
    let dir = ContentDir::new(name);
    write_content(&dir);
    let data = load_colony_data(dir.path()).unwrap();
    (dir, data)
}

fn kind(items: &ItemRegistry, path: &str) -> ItemKind {
    items.item(&ResourceId::new("minecraft", path)).unwrap()
}

fn engine_from(data: ColonyData) -> (Engine, ResearchManager) {
    let mut engine = Engine::new(data.items, data.book, data.config);
    engine.add_colony(COLONY);
    (engine, ResearchManager::new(data.research))
}

fn state(engine: &Engine, id: RequestId) -> RequestState {
    engine.requests(COLONY).unwrap().state(id).unwrap()
}

// ===========================================================================
// Loading
// ===========================================================================

#[test]
fn content_directory_loads_every_part() {
    let (_dir, data) = load("loads");
    assert_eq!(data.config.default_namespace, "colony");
    assert_eq!(data.config.max_dispatch_passes, 8);
    assert_eq!(data.pack.files, 4);
    assert_eq!(data.pack.added, 4);
    assert!(data.pack.rejected.is_empty());
    for path in ["blacksmith/torch", "stick", "baker/bread", "baker/seeded_bread"] {
        assert!(data.book.get(&ResourceId::new("colony", path)).is_some(), "{path} missing");
    }
    assert!(data.research.has_effect(&ResourceId::new("colony", "bakery_unlock")));
}

#[test]
fn resolver_priority_comes_from_config() {
    let (_dir, data) = load("priorities");
    let (mut engine, _) = engine_from(data);
    engine
        .add_building(COLONY, Building::worker("carpenter", "com.colony.job.Carpenter", 1))
        .unwrap();
    engine
        .add_building(COLONY, Building::worker("blacksmith", "com.colony.job.Blacksmith", 1))
        .unwrap();
    let names = engine.requests(COLONY).unwrap().resolvers().names();
    assert_eq!(names, vec!["warehouse", "crafting:carpenter", "crafting:blacksmith"]);
}

// ===========================================================================
// Crafting chain
// ===========================================================================

#[test]
fn torch_chain_from_loaded_recipes() {
    let (_dir, data) = load("torch_chain");
    let (mut engine, research) = engine_from(data);
    let smith = engine
        .add_building(COLONY, Building::worker("blacksmith", "com.colony.job.Blacksmith", 2))
        .unwrap();
    engine
        .add_building(COLONY, Building::worker("carpenter", "com.colony.job.Carpenter", 1))
        .unwrap();
    let planks = kind(engine.items(), "oak_planks");
    let torch = kind(engine.items(), "torch");
    let _ = engine
        .colony_mut(COLONY)
        .unwrap()
        .warehouse_mut()
        .add(&ItemStack::new(planks, 2));

    let torch_req = engine
        .request(
            COLONY,
            Deliverable::craft(&ItemStack::new(torch, 4)),
            Requester::External("player".into()),
            0,
        )
        .unwrap();
    engine.tick(&research).unwrap();
    let stick_req = engine.requests(COLONY).unwrap().get(torch_req).unwrap().children()[0];
    assert_eq!(state(&engine, stick_req), RequestState::Assigned);

    for id in [stick_req, torch_req] {
        engine.start_action(COLONY, id).unwrap();
        assert!(engine.finish_action(COLONY, id, &research).unwrap());
    }
    assert_eq!(state(&engine, torch_req), RequestState::Completed);
    let smith = engine.colony(COLONY).unwrap().building(smith).unwrap();
    assert_eq!(smith.inventory.count_of(&ItemStack::new(torch, 1)), 4);
}

// ===========================================================================
// Gating from data
// ===========================================================================

#[test]
fn loaded_research_unlocks_loaded_recipe() {
    let (_dir, data) = load("research");
    let (mut engine, mut research) = engine_from(data);
    let baker = engine
        .add_building(COLONY, Building::worker("baker", "com.colony.job.Baker", 1))
        .unwrap();
    assert_eq!(engine.refresh_recipes(COLONY, &research).unwrap().taught, 0);

    let node = ResourceId::new("colony", "bakery_basics");
    research.start_research(COLONY, &node, 0).unwrap();
    research.contribute_points(COLONY, &node, 10, 0).unwrap();
    engine.colony_mut(COLONY).unwrap().mark_research_changed();

    assert_eq!(engine.refresh_recipes(COLONY, &research).unwrap().taught, 1);
    let held = engine.colony(COLONY).unwrap().building(baker).unwrap().recipes()[0];
    let storage = engine.store().get(held).unwrap();
    assert_eq!(storage.source(), Some(&ResourceId::new("colony", "baker/bread")));
}

#[test]
fn must_exist_recipe_needs_a_taught_precursor() {
    let (_dir, data) = load("must_exist");
    let (mut engine, research) = engine_from(data);
    let baker = engine
        .add_building(COLONY, Building::worker("baker", "com.colony.job.Baker", 1))
        .unwrap();
    assert_eq!(engine.refresh_recipes(COLONY, &research).unwrap().taught, 0);

    // A player shows the baker plain bread by hand.
    let wheat = kind(engine.items(), "wheat");
    let bread = kind(engine.items(), "bread");
    engine
        .teach_recipe(
            COLONY,
            baker,
            NewRecipe::classic(vec![ItemStack::new(wheat, 3)], ItemStack::new(bread, 1)),
        )
        .unwrap();

    // The seeded variant now has its precursor.
    assert_eq!(engine.refresh_recipes(COLONY, &research).unwrap().taught, 1);
    assert_eq!(engine.colony(COLONY).unwrap().building(baker).unwrap().recipes().len(), 2);
}

// ===========================================================================
// Layered packs and reload
// ===========================================================================

#[test]
fn override_pack_removes_recipe_on_reload() {
    let (dir, data) = load("reload");
    let (mut engine, research) = engine_from(data);
    let smith = engine
        .add_building(COLONY, Building::worker("blacksmith", "com.colony.job.Blacksmith", 1))
        .unwrap();
    assert_eq!(engine.refresh_recipes(COLONY, &research).unwrap().taught, 1);

    fs::create_dir_all(dir.path().join("overrides")).unwrap();
    dir.write(
        "overrides/no_torch.json",
        r#"{ "type": "remove", "recipe-id-to-remove": "colony:blacksmith/torch" }"#,
    );
    let mut book = RecipeBook::new();
    load_recipe_pack(&dir.path().join("recipes"), "colony", engine.items(), &mut book).unwrap();
    let summary = load_recipe_pack(&dir.path().join("overrides"), "colony", engine.items(), &mut book).unwrap();
    assert_eq!(summary.removed, 1);

    engine.reload(book);
    assert!(engine.colony(COLONY).unwrap().building(smith).unwrap().recipes().is_empty());
    assert_eq!(engine.refresh_recipes(COLONY, &research).unwrap().taught, 0);

    let torch = kind(engine.items(), "torch");
    let id = engine
        .request(
            COLONY,
            Deliverable::craft(&ItemStack::new(torch, 4)),
            Requester::External("player".into()),
            0,
        )
        .unwrap();
    assert_eq!(engine.tick(&research).unwrap().dispatch.unresolved, 1);
    assert!(engine.requests(COLONY).unwrap().get(id).unwrap().is_unresolved());
}
