//! Stress tests for the request system.
//!
//! These are marked `#[ignore]` for nightly CI runs. Run with:
//!   cargo test --package colony-core -- --ignored

use colony_core::book::RecipeBook;
use colony_core::building::Building;
use colony_core::engine::{Engine, EngineConfig};
use colony_core::id::{ColonyId, RequestId};
use colony_core::item::ItemStack;
use colony_core::request::{Deliverable, RequestState, Requester};
use colony_core::research::NoResearch;
use colony_core::test_utils::*;

/// Build a colony with `bakers` bakeries and one residence per bakery
/// asking for `loaves` bread each. The warehouse holds `wheat`.
fn bakery_town(bakers: usize, loaves: u32, wheat_stock: u32) -> (Engine, Vec<RequestId>) {
    let colony = ColonyId(1);
    let mut book = RecipeBook::new();
    book.insert(bread_definition("baker"));
    let mut engine = Engine::new(test_registry(), book, EngineConfig::default());
    engine.add_colony(colony);
    let _ = engine
        .colony_mut(colony)
        .unwrap()
        .warehouse_mut()
        .add(&ItemStack::new(wheat(), wheat_stock));

    let mut ids = Vec::new();
    for i in 0..bakers {
        engine.add_building(colony, baker_building(1 + (i % 5) as u32)).unwrap();
        let house = engine.add_building(colony, Building::plain("residence", 1)).unwrap();
        ids.push(
            engine
                .request(
                    colony,
                    Deliverable::craft(&ItemStack::new(bread(), loaves)),
                    Requester::Building(house),
                    (i % 7) as i32,
                )
                .unwrap(),
        );
    }
    (engine, ids)
}

/// 1000 bread requests, each crafted to completion over successive ticks.
#[test]
#[ignore]
fn thousand_requests_drain() {
    let (mut engine, ids) = bakery_town(1000, 3, 9000);
    let colony = ColonyId(1);
    for _ in 0..10 {
        engine.tick(&NoResearch).unwrap();
        for &id in &ids {
            if engine.requests(colony).unwrap().state(id).unwrap() == RequestState::Assigned {
                engine.start_action(colony, id).unwrap();
                assert!(engine.finish_action(colony, id, &NoResearch).unwrap());
            }
        }
    }
    let requests = engine.requests(colony).unwrap();
    assert!(ids.iter().all(|&id| requests.state(id).unwrap() == RequestState::Completed));
    assert_eq!(engine.colony(colony).unwrap().warehouse().total(), 0);
    assert_eq!(engine.requests_mut(colony).unwrap().purge_finished(), 2000);
}

/// A starved colony keeps its requests unresolved without busy-looping.
#[test]
#[ignore]
fn starved_colony_stays_quiet() {
    let (mut engine, ids) = bakery_town(500, 1, 0);
    let first = engine.tick(&NoResearch).unwrap();
    // Every root commits to a baker; every ingredient request starves.
    assert_eq!(first.dispatch.unresolved, ids.len());
    assert_eq!(first.dispatch.created, ids.len());
    for _ in 0..100 {
        let report = engine.tick(&NoResearch).unwrap();
        assert_eq!(report.dispatch.attempted, 0);
    }
}
