#![no_main]
use arbitrary::Arbitrary;
use colony_core::book::RecipeBook;
use colony_core::engine::{Engine, EngineConfig};
use colony_core::id::{ColonyId, ItemKind, RequestId};
use colony_core::item::ItemStack;
use colony_core::request::{Deliverable, Requester};
use colony_core::research::NoResearch;
use colony_core::test_utils::*;
use libfuzzer_sys::fuzz_target;

/// A structured request-system operation for fuzzing.
#[derive(Arbitrary, Debug)]
enum FuzzOp {
    Stock { kind: u8, count: u8 },
    RequestStack { kind: u8, count: u8 },
    RequestCraft { kind: u8, count: u8 },
    Cancel { index: u8 },
    Work { index: u8 },
    Tick,
    Purge,
}

/// Top-level fuzz input: a sequence of operations.
#[derive(Arbitrary, Debug)]
struct FuzzInput {
    ops: Vec<FuzzOp>,
}

fn kind(k: u8) -> ItemKind {
    ItemKind(u32::from(k % 8) + 1)
}

fuzz_target!(|input: FuzzInput| {
    let colony = ColonyId(0);
    let mut book = RecipeBook::new();
    book.insert(bread_definition("baker"));
    book.insert(torch_definition());
    let mut engine = Engine::new(test_registry(), book, EngineConfig::default());
    engine.add_colony(colony);
    let _ = engine.add_building(colony, baker_building(1));
    let _ = engine.add_building(colony, colony_core::building::Building::worker("blacksmith", "com.colony.job.Blacksmith", 2));
    let mut ids: Vec<RequestId> = Vec::new();

    // Limit operations to prevent timeouts.
    let max_ops = input.ops.len().min(200);

    for op in &input.ops[..max_ops] {
        match *op {
            FuzzOp::Stock { kind: k, count } => {
                if let Some(c) = engine.colony_mut(colony) {
                    let _ = c.warehouse_mut().add(&ItemStack::new(kind(k), u32::from(count)));
                }
            }
            FuzzOp::RequestStack { kind: k, count } => {
                let d = Deliverable::stack(&ItemStack::new(kind(k), u32::from(count)));
                if let Ok(id) = engine.request(colony, d, Requester::External("fuzz".into()), 0) {
                    ids.push(id);
                }
            }
            FuzzOp::RequestCraft { kind: k, count } => {
                let d = Deliverable::craft(&ItemStack::new(kind(k), u32::from(count)));
                if let Ok(id) = engine.request(colony, d, Requester::External("fuzz".into()), 0) {
                    ids.push(id);
                }
            }
            FuzzOp::Cancel { index } => {
                if let Some(&id) = ids.get(index as usize % ids.len().max(1)) {
                    let _ = engine.cancel(colony, id, &NoResearch);
                }
            }
            FuzzOp::Work { index } => {
                if let Some(&id) = ids.get(index as usize % ids.len().max(1)) {
                    let _ = engine.start_action(colony, id);
                    let _ = engine.finish_action(colony, id, &NoResearch);
                }
            }
            FuzzOp::Tick => {
                let _ = engine.tick(&NoResearch);
            }
            FuzzOp::Purge => {
                if let Some(requests) = engine.requests_mut(colony) {
                    requests.purge_finished();
                }
            }
        }
    }
});
