//! Property-based tests for the colony core.
//!
//! Uses proptest to generate random inventories, recipe shapes and request
//! batches, then verify structural invariants hold.

use colony_core::book::RecipeBook;
use colony_core::building::Building;
use colony_core::engine::{Engine, EngineConfig};
use colony_core::id::{ColonyId, ItemKind};
use colony_core::item::{Inventory, ItemStack};
use colony_core::parse::parse_item;
use colony_core::recipe::RecipeDefinition;
use colony_core::request::{Deliverable, Request, RequestState, Requester};
use colony_core::research::NoResearch;
use colony_core::resolver::{ResolverRegistry, Resolution, ResolveContext, Resolver};
use colony_core::store::RecipeStore;
use colony_core::test_utils::*;
use colony_core::view::BuilderView;
use proptest::prelude::*;
use std::sync::Arc;

// ===========================================================================
// Generators
// ===========================================================================

/// One of the registered test items.
fn arb_kind() -> impl Strategy<Value = ItemKind> {
    (1u32..=8).prop_map(ItemKind)
}

fn arb_stack(max: u32) -> impl Strategy<Value = ItemStack> {
    (arb_kind(), 1..=max).prop_map(|(kind, count)| ItemStack::new(kind, count))
}

#[derive(Debug, Clone)]
enum InvOp {
    Add(ItemStack),
    Remove(ItemStack),
}

fn arb_inv_ops(max_ops: usize) -> impl Strategy<Value = Vec<InvOp>> {
    proptest::collection::vec(
        prop_oneof![
            arb_stack(64).prop_map(InvOp::Add),
            arb_stack(64).prop_map(InvOp::Remove),
        ],
        0..max_ops,
    )
}

struct Fixed(String, i32);

impl Resolver for Fixed {
    fn name(&self) -> &str {
        &self.0
    }
    fn priority(&self) -> i32 {
        self.1
    }
    fn can_resolve(&self, _: &Request, _: &ResolveContext<'_>) -> bool {
        false
    }
    fn resolve(&mut self, _: &Request, _: &mut ResolveContext<'_>) -> Option<Resolution> {
        None
    }
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    /// Bounded inventories never exceed capacity, and every item added is
    /// either stored, reported as overflow, or removed again.
    #[test]
    fn inventory_conserves_items(ops in arb_inv_ops(40), capacity in 1u32..500) {
        let mut inv = Inventory::with_capacity(capacity);
        let mut stored: u64 = 0;
        for op in ops {
            match op {
                InvOp::Add(stack) => {
                    let overflow = inv.add(&stack);
                    stored += u64::from(stack.count - overflow);
                }
                InvOp::Remove(stack) => {
                    let removed = inv.remove(&stack, stack.count);
                    stored -= u64::from(removed);
                }
            }
            prop_assert!(inv.total() <= capacity);
            prop_assert_eq!(u64::from(inv.total()), stored);
            prop_assert!(inv.stacks.iter().all(|s| s.count > 0));
        }
    }

    /// Resolvers come out sorted by priority, ties in registration order.
    #[test]
    fn resolver_order_is_stable(priorities in proptest::collection::vec(-5i32..5, 1..20)) {
        let mut registry = ResolverRegistry::new();
        for (i, &p) in priorities.iter().enumerate() {
            registry.register(Box::new(Fixed(i.to_string(), p)));
        }
        let mut expected: Vec<(i32, usize)> = priorities.iter().copied().zip(0..).collect();
        expected.sort();
        let names: Vec<String> = registry.names().into_iter().map(str::to_string).collect();
        let expected: Vec<String> = expected.into_iter().map(|(_, i)| i.to_string()).collect();
        prop_assert_eq!(names, expected);
    }

    /// Any crafter list over one recipe shape yields one store entry whose
    /// usage is the number of definitions bound.
    #[test]
    fn identical_shapes_share_storage(
        inputs in proptest::collection::vec(arb_stack(16), 1..5),
        crafters in proptest::collection::vec("[a-z]{3,8}", 1..6),
    ) {
        let mut store = RecipeStore::new();
        let mut first = None;
        for (i, crafter) in crafters.iter().enumerate() {
            let def = RecipeDefinition::builder(rid(&format!("r{i}")), ItemStack::new(bread(), 1))
                .crafter(crafter)
                .inputs(inputs.clone())
                .build()
                .unwrap();
            let a = def.recipe_storage(&mut store);
            let b = def.recipe_storage(&mut store);
            prop_assert!(Arc::ptr_eq(&a, &b));
            let first = first.get_or_insert_with(|| Arc::clone(&a));
            prop_assert!(Arc::ptr_eq(first, &a));
        }
        prop_assert_eq!(store.len(), 1);
        let token = first.unwrap().token();
        prop_assert_eq!(store.usage(token) as usize, crafters.len());
    }

    /// Warehouse-only dispatch moves items without creating or losing any,
    /// and every request either completes or is marked unresolved.
    #[test]
    fn warehouse_dispatch_conserves_items(
        stock in proptest::collection::vec(arb_stack(32), 0..6),
        wants in proptest::collection::vec(arb_stack(24), 1..10),
    ) {
        let colony = ColonyId(7);
        let mut engine = Engine::new(test_registry(), RecipeBook::new(), EngineConfig::default());
        engine.add_colony(colony);
        let house = engine.add_building(colony, Building::plain("residence", 1)).unwrap();
        let mut initial = 0;
        for stack in &stock {
            initial += stack.count;
            let _ = engine.colony_mut(colony).unwrap().warehouse_mut().add(stack);
        }
        let ids: Vec<_> = wants
            .iter()
            .map(|w| engine.request(colony, Deliverable::stack(w), Requester::Building(house), 0).unwrap())
            .collect();

        engine.tick(&NoResearch).unwrap();

        let c = engine.colony(colony).unwrap();
        let after = c.warehouse().total() + c.building(house).unwrap().inventory.total();
        prop_assert_eq!(after, initial);
        let requests = engine.requests(colony).unwrap();
        for id in ids {
            let r = requests.get(id).unwrap();
            prop_assert!(r.state() == RequestState::Completed || r.is_unresolved());
        }
    }

    /// Item references never panic, whatever the text.
    #[test]
    fn parse_item_never_panics(text in ".{0,40}") {
        let registry = test_registry();
        let _ = parse_item(&text, &registry);
    }

    /// View decoding rejects garbage with an error rather than a panic.
    #[test]
    fn view_decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..128)) {
        let _ = BuilderView::decode(&bytes);
    }
}
