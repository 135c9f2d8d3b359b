//! Recipe definitions as declared by data packs or code.
//!
//! A [`RecipeDefinition`] is the immutable, declarative form of a recipe:
//! who crafts it, from what, into what, and under which gating conditions.
//! The executable form lives in the [`RecipeStore`]; a definition resolves
//! to its store entry lazily through [`RecipeDefinition::recipe_storage`].

use crate::id::{BlockKind, ItemKind, RecipeToken, ResourceId};
use crate::item::{ItemStack, ItemTag, clean_stacks};
use crate::store::{NewRecipe, RecipeStorage, RecipeStore, StorageKind};
use std::cell::Cell;
use std::sync::Arc;

/// Crafter tag used when a definition does not name one.
pub const DEFAULT_CRAFTER: &str = "unknown";
pub const DEFAULT_MIN_LEVEL: u32 = 0;
pub const DEFAULT_MAX_LEVEL: u32 = 5;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A recipe definition that cannot be built. Names the offending field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed recipe {recipe}: field `{field}`: {reason}")]
pub struct MalformedRecipeError {
    pub recipe: String,
    pub field: &'static str,
    pub reason: String,
}

impl MalformedRecipeError {
    pub fn new(recipe: &ResourceId, field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            recipe: recipe.to_string(),
            field,
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Definition
// ---------------------------------------------------------------------------

/// Declared recipe variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RecipeType {
    #[default]
    Classic,
    /// The primary output may be swapped for one of the alternate outputs.
    MultiOutput,
    /// Accepts alternative ingredient sets. Resolves like a classic recipe.
    MultiInput,
}

/// What a parsed recipe file asks the recipe book to do.
#[derive(Debug, Clone)]
pub enum RecipeDirective {
    /// Add (or replace) a definition.
    Define(RecipeDefinition),
    /// Remove a previously declared definition.
    Remove { id: ResourceId, target: ResourceId },
}

/// An immutable recipe declaration.
#[derive(Debug, Clone)]
pub struct RecipeDefinition {
    id: ResourceId,
    crafter: String,
    recipe_type: RecipeType,
    inputs: Vec<ItemStack>,
    result: ItemStack,
    secondary: Vec<ItemStack>,
    alternates: Vec<ItemStack>,
    intermediate: BlockKind,
    loot_table: Option<ResourceId>,
    research_id: Option<ResourceId>,
    excluded_research_id: Option<ResourceId>,
    min_level: u32,
    max_level: u32,
    must_exist: bool,
    /// Store binding from the epoch it was made in.
    binding: Cell<Option<(u64, RecipeToken)>>,
}

impl RecipeDefinition {
    pub fn builder(id: ResourceId, result: ItemStack) -> RecipeBuilder {
        RecipeBuilder::new(id, result)
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn crafter(&self) -> &str {
        &self.crafter
    }

    pub fn recipe_type(&self) -> RecipeType {
        self.recipe_type
    }

    pub fn inputs(&self) -> &[ItemStack] {
        &self.inputs
    }

    pub fn cleaned_inputs(&self) -> Vec<ItemStack> {
        clean_stacks(&self.inputs)
    }

    /// Primary output. An empty stack for loot-table-only recipes.
    pub fn result(&self) -> &ItemStack {
        &self.result
    }

    pub fn secondary_outputs(&self) -> &[ItemStack] {
        &self.secondary
    }

    pub fn alternate_outputs(&self) -> &[ItemStack] {
        &self.alternates
    }

    pub fn intermediate(&self) -> BlockKind {
        self.intermediate
    }

    pub fn loot_table(&self) -> Option<&ResourceId> {
        self.loot_table.as_ref()
    }

    pub fn required_research(&self) -> Option<&ResourceId> {
        self.research_id.as_ref()
    }

    pub fn excluded_research(&self) -> Option<&ResourceId> {
        self.excluded_research_id.as_ref()
    }

    pub fn min_level(&self) -> u32 {
        self.min_level
    }

    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    /// Only valid for a building that already holds an equivalent recipe.
    pub fn must_exist(&self) -> bool {
        self.must_exist
    }

    /// Some input named an item the registry does not know. Such a
    /// definition is kept but never valid for any building.
    pub fn has_unresolved_input(&self) -> bool {
        self.inputs.iter().any(ItemStack::is_placeholder)
    }

    /// Free recipes need no inputs (loot-table gathering).
    pub fn is_free(&self) -> bool {
        self.inputs.iter().all(ItemStack::is_empty) && self.loot_table.is_some()
    }

    /// The store candidate this definition resolves to.
    pub fn to_new_recipe(&self) -> NewRecipe {
        NewRecipe {
            kind: match self.recipe_type {
                RecipeType::MultiOutput => StorageKind::MultiOutput,
                RecipeType::Classic | RecipeType::MultiInput => StorageKind::Classic,
            },
            source: Some(self.id.clone()),
            inputs: self
                .inputs
                .iter()
                .filter(|s| !s.is_empty() || s.is_placeholder())
                .cloned()
                .collect(),
            primary_output: self.result.clone(),
            alternate_outputs: self.alternates.clone(),
            secondary_outputs: self.secondary.clone(),
            intermediate: self.intermediate,
            loot_table: self.loot_table.clone(),
        }
    }

    /// Resolve this definition to its shared store entry.
    ///
    /// The first call per store epoch binds (or inserts) the entry and
    /// counts one use; later calls return the same `Arc` without touching the
    /// store. A binding from an older epoch, or one whose entry was evicted,
    /// is rebuilt.
    pub fn recipe_storage(&self, store: &mut RecipeStore) -> Arc<RecipeStorage> {
        if let Some((epoch, token)) = self.binding.get()
            && epoch == store.epoch()
            && let Some(existing) = store.get(token)
        {
            return Arc::clone(existing);
        }

        let storage = store.bind(self.to_new_recipe());
        let token = storage.token();
        store.register_use(token);
        self.binding.set(Some((store.epoch(), token)));
        storage
    }

    /// Token of the memoised binding, if it is current for `store`.
    pub fn bound_token(&self, store: &RecipeStore) -> Option<RecipeToken> {
        match self.binding.get() {
            Some((epoch, token)) if epoch == store.epoch() && store.contains(token) => Some(token),
            _ => None,
        }
    }

    /// Structural identity of the declaration, used to drop duplicates.
    pub fn definition_key(&self) -> DefinitionKey {
        DefinitionKey {
            output: (self.result.kind, self.result.tag.clone()),
            research_id: self.research_id.clone(),
            excluded_research_id: self.excluded_research_id.clone(),
            inputs: clean_stacks(&self.inputs),
            unresolved_inputs: self.inputs.iter().filter(|s| s.is_placeholder()).count(),
            secondary: clean_stacks(&self.secondary),
            alternates: self.alternates.iter().map(|s| (s.kind, s.tag.clone())).collect(),
            loot_table: self.loot_table.clone(),
        }
    }
}

/// Declaration-level identity: two definitions with equal keys describe the
/// same recipe under the same research conditions. Result stack size and
/// level bounds are not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DefinitionKey {
    output: (ItemKind, Option<ItemTag>),
    research_id: Option<ResourceId>,
    excluded_research_id: Option<ResourceId>,
    inputs: Vec<ItemStack>,
    unresolved_inputs: usize,
    secondary: Vec<ItemStack>,
    alternates: Vec<(ItemKind, Option<ItemTag>)>,
    loot_table: Option<ResourceId>,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`RecipeDefinition`]. Validates on [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct RecipeBuilder {
    def: RecipeDefinition,
}

impl RecipeBuilder {
    pub fn new(id: ResourceId, result: ItemStack) -> Self {
        Self {
            def: RecipeDefinition {
                id,
                crafter: DEFAULT_CRAFTER.to_string(),
                recipe_type: RecipeType::Classic,
                inputs: Vec::new(),
                result,
                secondary: Vec::new(),
                alternates: Vec::new(),
                intermediate: BlockKind::AIR,
                loot_table: None,
                research_id: None,
                excluded_research_id: None,
                min_level: DEFAULT_MIN_LEVEL,
                max_level: DEFAULT_MAX_LEVEL,
                must_exist: false,
                binding: Cell::new(None),
            },
        }
    }

    pub fn crafter(mut self, crafter: &str) -> Self {
        self.def.crafter = crafter.to_string();
        self
    }

    pub fn recipe_type(mut self, recipe_type: RecipeType) -> Self {
        self.def.recipe_type = recipe_type;
        self
    }

    pub fn input(mut self, stack: ItemStack) -> Self {
        self.def.inputs.push(stack);
        self
    }

    pub fn inputs(mut self, stacks: impl IntoIterator<Item = ItemStack>) -> Self {
        self.def.inputs.extend(stacks);
        self
    }

    pub fn secondary(mut self, stack: ItemStack) -> Self {
        self.def.secondary.push(stack);
        self
    }

    pub fn alternate(mut self, stack: ItemStack) -> Self {
        self.def.alternates.push(stack);
        self
    }

    pub fn intermediate(mut self, block: BlockKind) -> Self {
        self.def.intermediate = block;
        self
    }

    pub fn loot_table(mut self, table: ResourceId) -> Self {
        self.def.loot_table = Some(table);
        self
    }

    pub fn research(mut self, id: ResourceId) -> Self {
        self.def.research_id = Some(id);
        self
    }

    pub fn excluded_research(mut self, id: ResourceId) -> Self {
        self.def.excluded_research_id = Some(id);
        self
    }

    pub fn min_level(mut self, level: u32) -> Self {
        self.def.min_level = level;
        self
    }

    pub fn max_level(mut self, level: u32) -> Self {
        self.def.max_level = level;
        self
    }

    pub fn levels(self, min: u32, max: u32) -> Self {
        self.min_level(min).max_level(max)
    }

    pub fn must_exist(mut self, must_exist: bool) -> Self {
        self.def.must_exist = must_exist;
        self
    }

    pub fn build(self) -> Result<RecipeDefinition, MalformedRecipeError> {
        let def = self.def;
        if def.result.is_empty() && def.loot_table.is_none() {
            return Err(MalformedRecipeError::new(
                &def.id,
                "result",
                "recipe produces nothing: no result and no loot table",
            ));
        }
        if def.inputs.iter().all(ItemStack::is_empty) && def.loot_table.is_none() {
            return Err(MalformedRecipeError::new(
                &def.id,
                "inputs",
                "no usable inputs and no loot table",
            ));
        }
        if def.min_level > def.max_level {
            return Err(MalformedRecipeError::new(
                &def.id,
                "min-building-level",
                format!("min level {} above max level {}", def.min_level, def.max_level),
            ));
        }
        if def.recipe_type == RecipeType::MultiOutput
            && def.alternates.iter().all(ItemStack::is_empty)
        {
            return Err(MalformedRecipeError::new(
                &def.id,
                "alternate-output",
                "multi-output recipe without alternate outputs",
            ));
        }
        Ok(def)
    }
}
