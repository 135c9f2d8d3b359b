//! Crafting resolver: fulfils requests by having a worker building run a
//! recipe, requesting missing ingredients as child requests first.

use crate::building::{Building, CraftJob};
use crate::id::{BuildingId, RecipeToken, RequestId};
use crate::item::{ItemStack, StackPredicate};
use crate::recipe::RecipeDefinition;
use crate::request::{Deliverable, Request};
use crate::resolver::{
    CRAFTING_PRIORITY, ChildProgress, DisplayName, GENERAL_REQUESTER_KEY, Resolution,
    ResolveContext, ResolveOutcome, Resolver,
};
use crate::store::{RecipeStorage, RecipeStore};
use std::collections::HashMap;
use std::sync::Arc;

/// A committed craft still waiting on ingredient requests.
#[derive(Debug, Clone, Copy)]
struct PendingCraft {
    building: BuildingId,
    recipe: RecipeToken,
    runs: u32,
    outstanding: usize,
}

/// Resolves requests with the recipes of one crafter type ("baker",
/// "blacksmith").
#[derive(Debug)]
pub struct CraftingResolver {
    crafter: String,
    name: String,
    pending: HashMap<RequestId, PendingCraft>,
}

impl CraftingResolver {
    pub fn new(crafter: &str) -> Self {
        Self {
            crafter: crafter.to_string(),
            name: format!("crafting:{crafter}"),
            pending: HashMap::new(),
        }
    }

    pub fn crafter(&self) -> &str {
        &self.crafter
    }

    /// Requests waiting on children.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// An ancestor already asks for the same item, so crafting it again
    /// here would recurse. Tags count: a water potion under a strength
    /// potion is a different item.
    fn in_cycle(request: &Request, ctx: &ResolveContext<'_>) -> bool {
        let predicate = request.deliverable().predicate();
        ctx.ancestors(request)
            .any(|a| a.deliverable().predicate().overlaps(predicate))
    }

    /// First usable recipe of `building` producing `predicate`: held tokens
    /// first, then book definitions for this crafter that pass gating.
    fn pick_recipe(
        &self,
        building: BuildingId,
        predicate: &StackPredicate,
        tried: &[RecipeToken],
        ctx: &mut ResolveContext<'_>,
    ) -> Option<Arc<RecipeStorage>> {
        let b = ctx.colony.building(building)?;
        let held = b.recipes().iter().find_map(|&token| {
            let storage = ctx.store.get(token)?;
            let usable = !tried.contains(&token) && storage.output_matching(predicate).is_some();
            usable.then(|| Arc::clone(storage))
        });
        if held.is_some() {
            return held;
        }

        let book = ctx.book;
        let candidates: Vec<&RecipeDefinition> = {
            let gating = ctx.gating();
            let store: &RecipeStore = &*ctx.store;
            let b = ctx.colony.building(building)?;
            book.valid_for(b, &gating)
                .filter(|d| produces(d, predicate))
                .filter(|d| d.bound_token(store).is_none_or(|t| !tried.contains(&t)))
                .collect()
        };
        candidates
            .into_iter()
            .map(|def| def.recipe_storage(ctx.store))
            .find(|storage| !tried.contains(&storage.token()))
    }

    /// Queued and pending crafts of `building`.
    fn load(&self, building: &Building) -> usize {
        let pending = self
            .pending
            .values()
            .filter(|p| p.building == building.id())
            .count();
        building.craft_queue().len() + pending
    }

    /// Ingredients already promised to crafts `building` has committed to.
    fn reserved(&self, building: &Building, store: &RecipeStore) -> Vec<ItemStack> {
        let jobs = building
            .craft_queue()
            .iter()
            .map(|job| (job.recipe, job.runs))
            .chain(
                self.pending
                    .values()
                    .filter(|p| p.building == building.id())
                    .map(|p| (p.recipe, p.runs)),
            );
        let mut reserved: Vec<ItemStack> = Vec::new();
        for (recipe, runs) in jobs {
            let Some(storage) = store.get(recipe) else {
                continue;
            };
            for input in storage.cleaned_inputs() {
                let amount = input.count.saturating_mul(runs);
                match reserved.iter_mut().find(|r| r.same_item(input)) {
                    Some(r) => r.count = r.count.saturating_add(amount),
                    None => reserved.push(input.with_count(amount)),
                }
            }
        }
        reserved
    }

    fn has_candidate(
        &self,
        predicate: &StackPredicate,
        tried: &[RecipeToken],
        ctx: &ResolveContext<'_>,
    ) -> bool {
        let gating = ctx.gating();
        ctx.colony.buildings_of(&self.crafter).any(|b| {
            let held = b.recipes().iter().any(|&token| {
                !tried.contains(&token)
                    && ctx
                        .store
                        .get(token)
                        .is_some_and(|s| s.output_matching(predicate).is_some())
            });
            held || ctx.book.valid_for(b, &gating).any(|d| {
                produces(d, predicate)
                    && d.bound_token(&*ctx.store).is_none_or(|t| !tried.contains(&t))
            })
        })
    }
}

fn produces(def: &RecipeDefinition, predicate: &StackPredicate) -> bool {
    predicate.matches(def.result()) || def.alternate_outputs().iter().any(|s| predicate.matches(s))
}

/// Shortfall of each cleaned input for `runs` runs, given what the
/// building holds beyond its existing commitments.
fn shortfall(
    storage: &RecipeStorage,
    runs: u32,
    held: impl Fn(&ItemStack) -> u32,
) -> Vec<Deliverable> {
    storage
        .cleaned_inputs()
        .iter()
        .filter_map(|input| {
            let needed = input.count.saturating_mul(runs);
            let missing = needed.saturating_sub(held(input));
            (missing > 0).then(|| Deliverable::Stack {
                predicate: StackPredicate::exact(input),
                count: missing,
                min_count: missing,
            })
        })
        .collect()
}

impl Resolver for CraftingResolver {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        CRAFTING_PRIORITY
    }

    fn can_resolve(&self, request: &Request, ctx: &ResolveContext<'_>) -> bool {
        if Self::in_cycle(request, ctx) {
            return false;
        }
        self.has_candidate(request.deliverable().predicate(), request.tried_recipes(), ctx)
    }

    fn resolve(&mut self, request: &Request, ctx: &mut ResolveContext<'_>) -> Option<Resolution> {
        let predicate = request.deliverable().predicate().clone();
        // Least busy first; ties keep colony order.
        let mut buildings: Vec<(usize, BuildingId)> = ctx
            .colony
            .buildings_of(&self.crafter)
            .map(|b| (self.load(b), b.id()))
            .collect();
        buildings.sort_by_key(|&(load, _)| load);
        let buildings: Vec<BuildingId> = buildings.into_iter().map(|(_, id)| id).collect();

        for building in buildings {
            let tried = request.tried_recipes();
            let Some(storage) = self.pick_recipe(building, &predicate, tried, ctx) else {
                continue;
            };
            let Some(output) = storage.output_matching(&predicate) else {
                continue;
            };
            let runs = request.deliverable().count().div_ceil(output.count.max(1)).max(1);
            let children = {
                let b = ctx.colony.building(building)?;
                let reserved = self.reserved(b, &*ctx.store);
                shortfall(&storage, runs, |input| {
                    let promised = reserved
                        .iter()
                        .find(|r| r.same_item(input))
                        .map_or(0, |r| r.count);
                    b.inventory.count_of(input).saturating_sub(promised)
                })
            };
            let token = storage.token();

            if children.is_empty() {
                ctx.colony.building_mut(building)?.queue_craft(CraftJob {
                    request: request.id(),
                    recipe: token,
                    runs,
                });
            } else {
                self.pending.insert(
                    request.id(),
                    PendingCraft {
                        building,
                        recipe: token,
                        runs,
                        outstanding: children.len(),
                    },
                );
            }
            tracing::debug!(
                resolver = %self.name,
                request = ?request.id(),
                ?building,
                runs,
                children = children.len(),
                "craft committed"
            );
            return Some(Resolution {
                children,
                assignee: Some(building),
                recipe: Some(token),
                outcome: ResolveOutcome::Pending,
            });
        }
        None
    }

    fn on_child_complete(
        &mut self,
        parent: &Request,
        _child: &Request,
        ctx: &mut ResolveContext<'_>,
    ) -> ChildProgress {
        let Some(pending) = self.pending.get_mut(&parent.id()) else {
            return ChildProgress::Ready;
        };
        pending.outstanding = pending.outstanding.saturating_sub(1);
        if pending.outstanding > 0 {
            return ChildProgress::Waiting;
        }
        let pending = *pending;
        self.pending.remove(&parent.id());
        match ctx.colony.building_mut(pending.building) {
            Some(building) => {
                building.queue_craft(CraftJob {
                    request: parent.id(),
                    recipe: pending.recipe,
                    runs: pending.runs,
                });
                ChildProgress::Ready
            }
            None => {
                tracing::debug!(
                    request = ?parent.id(),
                    building = ?pending.building,
                    "crafter gone before ingredients arrived"
                );
                ChildProgress::Reattempt
            }
        }
    }

    fn on_child_cancelled(
        &mut self,
        parent: &Request,
        _child: &Request,
        _ctx: &mut ResolveContext<'_>,
    ) -> bool {
        self.pending.remove(&parent.id());
        true
    }

    fn on_request_cancelled(&mut self, request: &Request, ctx: &mut ResolveContext<'_>) {
        self.pending.remove(&request.id());
        if let Some(building) = request.assignee().and_then(|b| ctx.colony.building_mut(b)) {
            building.take_craft(request.id());
        }
    }

    fn on_action_finished(&mut self, request: &Request, ctx: &mut ResolveContext<'_>) -> bool {
        let Some(crafter) = request.assignee() else {
            return false;
        };
        let job = ctx
            .colony
            .building_mut(crafter)
            .and_then(|b| b.take_craft(request.id()));
        let Some(job) = job else {
            return false;
        };
        let Some(storage) = ctx.store.get(job.recipe).cloned() else {
            tracing::warn!(request = ?request.id(), "recipe vanished before the craft finished");
            return false;
        };
        let predicate = request.deliverable().predicate();
        let Some(output) = storage.output_matching(predicate).cloned() else {
            return false;
        };

        let Some(inventory) = ctx.colony.inventory_mut(crafter) else {
            return false;
        };
        let missing = storage
            .cleaned_inputs()
            .iter()
            .any(|input| inventory.count_of(input) < input.count.saturating_mul(job.runs));
        if missing {
            tracing::debug!(request = ?request.id(), "ingredients missing at craft time");
            return false;
        }
        for input in storage.cleaned_inputs() {
            let _ = inventory.remove(input, input.count.saturating_mul(job.runs));
        }

        let destination = request
            .requester()
            .building()
            .filter(|b| ctx.colony.building(*b).is_some())
            .unwrap_or(crafter);
        let mut produced = vec![output.with_count(output.count.saturating_mul(job.runs))];
        produced.extend(
            storage
                .secondary_outputs()
                .iter()
                .map(|s| s.with_count(s.count.saturating_mul(job.runs))),
        );
        for stack in produced {
            let overflow = ctx
                .colony
                .inventory_mut(destination)
                .map_or(stack.count, |inv| inv.add(&stack));
            if overflow > 0 {
                let lost = ctx.colony.warehouse_mut().add(&stack.with_count(overflow));
                if lost > 0 {
                    tracing::warn!(
                        request = ?request.id(),
                        lost,
                        "crafted items did not fit anywhere"
                    );
                }
            }
        }
        true
    }

    fn display_name(&self, request: &Request, ctx: &ResolveContext<'_>) -> DisplayName {
        let job = request
            .assignee()
            .and_then(|b| ctx.colony.building(b))
            .and_then(|b| b.job_display_name());
        match job {
            Some(job) => DisplayName::Key(job.to_lowercase()),
            None => DisplayName::Key(GENERAL_REQUESTER_KEY.to_string()),
        }
    }
}
