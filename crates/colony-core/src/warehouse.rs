//! Instant pulls from the colony warehouse.

use crate::request::{Deliverable, Request};
use crate::resolver::{DisplayName, Resolution, ResolveContext, Resolver, WAREHOUSE_PRIORITY};

/// Hands over stock from the colony warehouse when it holds the full amount.
#[derive(Debug, Default)]
pub struct WarehouseResolver;

pub const WAREHOUSE_KEY: &str = "com.colony.building.warehouse";

impl WarehouseResolver {
    pub fn new() -> Self {
        Self
    }
}

impl Resolver for WarehouseResolver {
    fn name(&self) -> &str {
        "warehouse"
    }

    fn priority(&self) -> i32 {
        WAREHOUSE_PRIORITY
    }

    fn can_resolve(&self, request: &Request, ctx: &ResolveContext<'_>) -> bool {
        let Deliverable::Stack { predicate, count, .. } = request.deliverable() else {
            return false;
        };
        ctx.colony.warehouse().count_matching(predicate) >= *count
    }

    fn resolve(&mut self, request: &Request, ctx: &mut ResolveContext<'_>) -> Option<Resolution> {
        let Deliverable::Stack { predicate, count, .. } = request.deliverable() else {
            return None;
        };
        if ctx.colony.warehouse().count_matching(predicate) < *count {
            return None;
        }
        let taken = ctx.colony.warehouse_mut().take_matching(predicate, *count);

        if let Some(building) = request.requester().building() {
            for stack in &taken {
                let overflow = ctx
                    .colony
                    .inventory_mut(building)
                    .map_or(stack.count, |inv| inv.add(stack));
                if overflow > 0 {
                    // Back to storage; the requester is full or gone.
                    let _ = ctx.colony.warehouse_mut().add(&stack.with_count(overflow));
                }
            }
        }
        tracing::debug!(request = ?request.id(), count, "pulled from warehouse");
        Some(Resolution::delivered())
    }

    fn display_name(&self, _request: &Request, _ctx: &ResolveContext<'_>) -> DisplayName {
        DisplayName::Key(WAREHOUSE_KEY.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::RecipeBook;
    use crate::colony::Colony;
    use crate::id::{ColonyId, RequestId};
    use crate::item::ItemStack;
    use crate::request::Requester;
    use crate::research::NoResearch;
    use crate::store::RecipeStore;
    use crate::test_utils::*;
    use slotmap::SlotMap;

    #[test]
    fn pulls_full_stack_into_requester() {
        let mut colony = Colony::new(ColonyId(0));
        let baker = colony.add_building(baker_building(1));
        let _ = colony.warehouse_mut().add(&ItemStack::new(wheat(), 10));

        let mut requests: SlotMap<RequestId, Request> = SlotMap::with_key();
        let id = requests.insert_with_key(|id| {
            let mut r = Request::new(
                Deliverable::stack(&ItemStack::new(wheat(), 4)),
                Requester::Building(baker),
                0,
                None,
                0,
            );
            r.id = id;
            r
        });
        let request = requests[id].clone();
        let book = RecipeBook::new();
        let mut store = RecipeStore::new();
        let mut ctx = ResolveContext {
            colony: &mut colony,
            requests: &requests,
            book: &book,
            store: &mut store,
            research: &NoResearch,
        };

        let mut resolver = WarehouseResolver::new();
        assert!(resolver.can_resolve(&request, &ctx));
        let resolution = resolver.resolve(&request, &mut ctx).unwrap();
        assert!(resolution.children.is_empty());

        assert_eq!(colony.warehouse().count_of(&ItemStack::new(wheat(), 1)), 6);
        let inventory = &colony.building(baker).unwrap().inventory;
        assert_eq!(inventory.count_of(&ItemStack::new(wheat(), 1)), 4);
    }

    #[test]
    fn declines_partial_stock_and_craft_requests() {
        let mut colony = Colony::new(ColonyId(0));
        let _ = colony.warehouse_mut().add(&ItemStack::new(wheat(), 2));
        let mut requests: SlotMap<RequestId, Request> = SlotMap::with_key();
        let stack = requests.insert(Request::new(
            Deliverable::stack(&ItemStack::new(wheat(), 3)),
            Requester::External("player".into()),
            0,
            None,
            0,
        ));
        let craft = requests.insert(Request::new(
            Deliverable::craft(&ItemStack::new(wheat(), 1)),
            Requester::External("player".into()),
            0,
            None,
            1,
        ));
        let book = RecipeBook::new();
        let mut store = RecipeStore::new();
        let ctx = ResolveContext {
            colony: &mut colony,
            requests: &requests,
            book: &book,
            store: &mut store,
            research: &NoResearch,
        };
        let resolver = WarehouseResolver::new();
        assert!(!resolver.can_resolve(&requests[stack], &ctx));
        assert!(!resolver.can_resolve(&requests[craft], &ctx));
    }
}
