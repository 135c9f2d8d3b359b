//! Bakery example: a residence asks for bread, a baker crafts it.
//!
//! Parses a recipe from JSON, builds a colony with a warehouse and one
//! bakery, raises a bread request and walks it through dispatch and the
//! worker callbacks. Request events are printed as they are delivered.
//!
//! Run with: `cargo run -p colony-core --example bakery`

use colony_core::book::RecipeBook;
use colony_core::building::Building;
use colony_core::engine::{Engine, EngineConfig};
use colony_core::id::{ColonyId, ResourceId};
use colony_core::item::ItemStack;
use colony_core::parse::parse_recipe;
use colony_core::registry::RegistryBuilder;
use colony_core::request::{Deliverable, Requester};
use colony_core::research::NoResearch;
use serde_json::json;

fn main() {
    // --- Step 1: Items and recipes ---

    let mut items = RegistryBuilder::new();
    let wheat = items.item("minecraft:wheat").expect("valid id");
    let bread = items.item("minecraft:bread").expect("valid id");
    let items = items.build();

    let recipe = json!({
        "crafter": "baker",
        "inputs": [{ "item": "minecraft:wheat", "count": 3 }],
        "result": "minecraft:bread",
        "max-building-level": 5
    });
    let mut book = RecipeBook::new();
    let directive = parse_recipe(ResourceId::new("colony", "bread"), &recipe, &items).expect("recipe parses");
    println!("book: {:?}", book.apply(directive));

    // --- Step 2: Colony ---

    let colony = ColonyId(1);
    let mut engine = Engine::new(items, book, EngineConfig::default());
    engine.add_colony(colony);
    let bakery = engine
        .add_building(colony, Building::worker("baker", "com.colony.job.Baker", 1))
        .expect("colony exists");
    let house = engine
        .add_building(colony, Building::plain("residence", 1))
        .expect("colony exists");
    let _ = engine
        .colony_mut(colony)
        .expect("colony exists")
        .warehouse_mut()
        .add(&ItemStack::new(wheat, 12));

    engine
        .requests_mut(colony)
        .expect("colony exists")
        .events_mut()
        .on_event(Box::new(|event| println!("  event: {event:?}")));

    // --- Step 3: Request and dispatch ---

    let request = engine
        .request(
            colony,
            Deliverable::craft(&ItemStack::new(bread, 2)),
            Requester::Building(house),
            0,
        )
        .expect("colony exists");
    let report = engine.tick(&NoResearch).expect("dispatch");
    println!("tick {}: {:?}", report.tick, report.dispatch);
    println!(
        "handled by: {:?}",
        engine.display_name(colony, request, &NoResearch).expect("colony exists")
    );

    // --- Step 4: The baker works ---

    engine.start_action(colony, request).expect("request is assigned");
    let delivered = engine.finish_action(colony, request, &NoResearch).expect("request is active");
    engine.tick(&NoResearch).expect("dispatch");
    println!("delivered: {delivered}");

    let c = engine.colony(colony).expect("colony exists");
    let bread_stack = ItemStack::new(bread, 1);
    println!(
        "residence bread: {}, bakery wheat left: {}, warehouse wheat: {}",
        c.building(house).map_or(0, |b| b.inventory.count_of(&bread_stack)),
        c.building(bakery).map_or(0, |b| b.inventory.count_of(&ItemStack::new(wheat, 1))),
        c.warehouse().count_of(&ItemStack::new(wheat, 1)),
    );
}
