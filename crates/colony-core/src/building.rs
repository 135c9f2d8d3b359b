use crate::id::{BuildingId, ColonyId, RecipeToken, RequestId};
use crate::item::Inventory;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A crafting run committed to a worker building, waiting for the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CraftJob {
    pub request: RequestId,
    pub recipe: RecipeToken,
    /// How many times the recipe is run.
    pub runs: u32,
}

/// A worker building: the requester and crafter of the request system.
#[derive(Debug, Clone)]
pub struct Building {
    id: BuildingId,
    colony: ColonyId,
    /// Crafter-type tag matched against recipe definitions ("baker").
    crafter: String,
    /// Job title translation key. `None` for non-worker buildings.
    job_display_name: Option<String>,
    level: u32,
    /// Held recipe tokens in priority order.
    recipes: Vec<RecipeToken>,
    pub inventory: Inventory,
    pub worker_name: Option<String>,
    craft_queue: VecDeque<CraftJob>,
}

impl Building {
    /// A worker building. The id is assigned when added to a colony.
    pub fn worker(crafter: &str, job_display_name: &str, level: u32) -> Self {
        Self {
            id: BuildingId::default(),
            colony: ColonyId(0),
            crafter: crafter.to_string(),
            job_display_name: Some(job_display_name.to_string()),
            level,
            recipes: Vec::new(),
            inventory: Inventory::new(),
            worker_name: None,
            craft_queue: VecDeque::new(),
        }
    }

    /// A building without a job (e.g. a residence requesting food).
    pub fn plain(kind: &str, level: u32) -> Self {
        Self {
            job_display_name: None,
            ..Self::worker(kind, "", level)
        }
    }

    pub fn id(&self) -> BuildingId {
        self.id
    }

    pub fn colony(&self) -> ColonyId {
        self.colony
    }

    pub fn crafter(&self) -> &str {
        &self.crafter
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn job_display_name(&self) -> Option<&str> {
        self.job_display_name.as_deref()
    }

    pub fn is_worker(&self) -> bool {
        self.job_display_name.is_some()
    }

    pub fn recipes(&self) -> &[RecipeToken] {
        &self.recipes
    }

    pub fn holds_recipe(&self, token: RecipeToken) -> bool {
        self.recipes.contains(&token)
    }

    pub fn craft_queue(&self) -> &VecDeque<CraftJob> {
        &self.craft_queue
    }

    pub(crate) fn attach(&mut self, id: BuildingId, colony: ColonyId) {
        self.id = id;
        self.colony = colony;
    }

    pub(crate) fn set_level(&mut self, level: u32) {
        self.level = level;
    }

    /// Append a recipe token. Returns false if already held.
    pub(crate) fn add_recipe(&mut self, token: RecipeToken) -> bool {
        if self.holds_recipe(token) {
            return false;
        }
        self.recipes.push(token);
        true
    }

    pub(crate) fn remove_recipe(&mut self, token: RecipeToken) -> bool {
        let before = self.recipes.len();
        self.recipes.retain(|&t| t != token);
        self.recipes.len() != before
    }

    /// Drop tokens for which `keep` returns false. Returns the dropped tokens.
    pub(crate) fn retain_recipes(
        &mut self,
        mut keep: impl FnMut(RecipeToken) -> bool,
    ) -> Vec<RecipeToken> {
        let mut dropped = Vec::new();
        self.recipes.retain(|&t| {
            let kept = keep(t);
            if !kept {
                dropped.push(t);
            }
            kept
        });
        dropped
    }

    pub(crate) fn queue_craft(&mut self, job: CraftJob) {
        self.craft_queue.push_back(job);
    }

    /// Remove the queued job for a request, if any.
    pub(crate) fn take_craft(&mut self, request: RequestId) -> Option<CraftJob> {
        let pos = self.craft_queue.iter().position(|j| j.request == request)?;
        self.craft_queue.remove(pos)
    }
}
