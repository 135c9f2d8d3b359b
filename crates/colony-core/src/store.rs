//! De-duplicating registry of resolved recipes.
//!
//! Many recipe definitions can describe the same transformation (the same
//! bread from the same wheat, declared by two different crafters). The store
//! keys every resolved recipe by its [`RecipeSignature`] so that all of them
//! share one [`RecipeStorage`] entry. Entries are handed out as `Arc`s and
//! never mutated in place; a reload replaces the whole store and bumps its
//! epoch so stale bindings can be detected.

use crate::id::{BlockKind, ItemKind, RecipeToken, ResourceId};
use crate::item::{ItemStack, ItemTag, StackPredicate, clean_stacks};
use slotmap::{SecondaryMap, SlotMap};
use std::collections::HashMap;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Resolved recipe
// ---------------------------------------------------------------------------

/// Which resolved variant a recipe is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    /// One primary output.
    Classic,
    /// The primary output may be swapped for one of the alternates.
    MultiOutput,
}

/// A recipe ready to be stored. Turned into a [`RecipeStorage`] on insert.
#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub kind: StorageKind,
    pub source: Option<ResourceId>,
    pub inputs: Vec<ItemStack>,
    pub primary_output: ItemStack,
    pub alternate_outputs: Vec<ItemStack>,
    pub secondary_outputs: Vec<ItemStack>,
    pub intermediate: BlockKind,
    pub loot_table: Option<ResourceId>,
}

impl NewRecipe {
    /// A classic recipe with no extras.
    pub fn classic(inputs: Vec<ItemStack>, output: ItemStack) -> Self {
        Self {
            kind: StorageKind::Classic,
            source: None,
            inputs,
            primary_output: output,
            alternate_outputs: Vec::new(),
            secondary_outputs: Vec::new(),
            intermediate: BlockKind::AIR,
            loot_table: None,
        }
    }

    pub fn with_source(mut self, source: ResourceId) -> Self {
        self.source = Some(source);
        self
    }

    pub fn signature(&self) -> RecipeSignature {
        RecipeSignature::new(
            &self.primary_output,
            &self.inputs,
            &self.secondary_outputs,
            &self.alternate_outputs,
            self.intermediate,
            self.loot_table.as_ref(),
        )
    }
}

/// A resolved, shared recipe entry.
#[derive(Debug)]
pub struct RecipeStorage {
    token: RecipeToken,
    kind: StorageKind,
    source: Option<ResourceId>,
    inputs: Vec<ItemStack>,
    cleaned_inputs: Vec<ItemStack>,
    primary_output: ItemStack,
    alternate_outputs: Vec<ItemStack>,
    secondary_outputs: Vec<ItemStack>,
    intermediate: BlockKind,
    loot_table: Option<ResourceId>,
}

impl RecipeStorage {
    pub fn token(&self) -> RecipeToken {
        self.token
    }

    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    /// Id of the definition that first materialised this entry, if any.
    pub fn source(&self) -> Option<&ResourceId> {
        self.source.as_ref()
    }

    pub fn inputs(&self) -> &[ItemStack] {
        &self.inputs
    }

    /// Inputs merged by item and sorted canonically.
    pub fn cleaned_inputs(&self) -> &[ItemStack] {
        &self.cleaned_inputs
    }

    pub fn primary_output(&self) -> &ItemStack {
        &self.primary_output
    }

    pub fn alternate_outputs(&self) -> &[ItemStack] {
        &self.alternate_outputs
    }

    pub fn secondary_outputs(&self) -> &[ItemStack] {
        &self.secondary_outputs
    }

    pub fn intermediate(&self) -> BlockKind {
        self.intermediate
    }

    pub fn loot_table(&self) -> Option<&ResourceId> {
        self.loot_table.as_ref()
    }

    /// The output stack satisfying `predicate`: the primary output first,
    /// then alternates in declaration order.
    pub fn output_matching(&self, predicate: &StackPredicate) -> Option<&ItemStack> {
        std::iter::once(&self.primary_output)
            .chain(self.alternate_outputs.iter())
            .find(|out| predicate.matches(out))
    }

    pub fn signature(&self) -> RecipeSignature {
        RecipeSignature::new(
            &self.primary_output,
            &self.inputs,
            &self.secondary_outputs,
            &self.alternate_outputs,
            self.intermediate,
            self.loot_table.as_ref(),
        )
    }
}

// ---------------------------------------------------------------------------
// Structural signature
// ---------------------------------------------------------------------------

/// Structural identity used only for store de-duplication.
///
/// Primary output is compared by item identity (kind and tag) ignoring stack
/// size; inputs are compared as a multiset, plus the number of unresolved
/// input placeholders so a recipe missing an ingredient never merges with
/// the complete one. Secondary outputs, alternates,
/// the intermediate and the loot table all take part, so recipes that only
/// differ in their extra outputs never collapse into one entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecipeSignature {
    output: (ItemKind, Option<ItemTag>),
    inputs: Vec<ItemStack>,
    unresolved_inputs: usize,
    secondary: Vec<ItemStack>,
    alternates: Vec<(ItemKind, Option<ItemTag>)>,
    intermediate: BlockKind,
    loot_table: Option<ResourceId>,
}

impl RecipeSignature {
    pub fn new(
        primary: &ItemStack,
        inputs: &[ItemStack],
        secondary: &[ItemStack],
        alternates: &[ItemStack],
        intermediate: BlockKind,
        loot_table: Option<&ResourceId>,
    ) -> Self {
        Self {
            output: (primary.kind, primary.tag.clone()),
            inputs: clean_stacks(inputs),
            unresolved_inputs: inputs.iter().filter(|s| s.is_placeholder()).count(),
            secondary: clean_stacks(secondary),
            alternates: alternates.iter().map(|s| (s.kind, s.tag.clone())).collect(),
            intermediate,
            loot_table: loot_table.cloned(),
        }
    }
}

// ---------------------------------------------------------------------------
// RecipeStore
// ---------------------------------------------------------------------------

/// Colony-wide registry of resolved recipes.
#[derive(Debug, Default)]
pub struct RecipeStore {
    entries: SlotMap<RecipeToken, Arc<RecipeStorage>>,
    by_signature: HashMap<RecipeSignature, RecipeToken>,
    usage: SecondaryMap<RecipeToken, u32>,
    epoch: u64,
}

impl RecipeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the entry structurally identical to `recipe`, inserting it if
    /// none exists. Does not touch usage counters.
    pub fn bind(&mut self, recipe: NewRecipe) -> Arc<RecipeStorage> {
        let signature = recipe.signature();
        if let Some(&token) = self.by_signature.get(&signature)
            && let Some(existing) = self.entries.get(token)
        {
            return Arc::clone(existing);
        }

        let cleaned_inputs = clean_stacks(&recipe.inputs);
        let token = self.entries.insert_with_key(|token| {
            Arc::new(RecipeStorage {
                token,
                kind: recipe.kind,
                source: recipe.source,
                inputs: recipe.inputs,
                cleaned_inputs,
                primary_output: recipe.primary_output,
                alternate_outputs: recipe.alternate_outputs,
                secondary_outputs: recipe.secondary_outputs,
                intermediate: recipe.intermediate,
                loot_table: recipe.loot_table,
            })
        });
        self.by_signature.insert(signature, token);
        self.usage.insert(token, 0);
        tracing::trace!(?token, "recipe store: new entry");
        Arc::clone(&self.entries[token])
    }

    /// Record one more active binding of an entry.
    pub fn register_use(&mut self, token: RecipeToken) {
        if let Some(count) = self.usage.get_mut(token) {
            *count += 1;
        }
    }

    /// Drop one binding of an entry. Saturates at zero.
    pub fn release(&mut self, token: RecipeToken) {
        if let Some(count) = self.usage.get_mut(token) {
            *count = count.saturating_sub(1);
        }
    }

    /// Number of active bindings of an entry. Zero for unknown tokens.
    pub fn usage(&self, token: RecipeToken) -> u32 {
        self.usage.get(token).copied().unwrap_or(0)
    }

    pub fn get(&self, token: RecipeToken) -> Option<&Arc<RecipeStorage>> {
        self.entries.get(token)
    }

    pub fn contains(&self, token: RecipeToken) -> bool {
        self.entries.contains_key(token)
    }

    /// Token of the entry with this signature, if stored.
    pub fn find(&self, signature: &RecipeSignature) -> Option<RecipeToken> {
        self.by_signature.get(signature).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Generation counter. Bumped by every [`reload`](Self::reload).
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Drop every entry. Tokens handed out before the reload no longer
    /// resolve, and memoised bindings from the previous epoch are rebuilt on
    /// next use.
    pub fn reload(&mut self) {
        self.entries.clear();
        self.by_signature.clear();
        self.usage.clear();
        self.epoch += 1;
        tracing::debug!(epoch = self.epoch, "recipe store reloaded");
    }

    /// Remove entries with no active bindings. Returns how many were evicted.
    pub fn evict_unused(&mut self) -> usize {
        let unused: Vec<RecipeToken> = self
            .usage
            .iter()
            .filter(|&(_, &count)| count == 0)
            .map(|(token, _)| token)
            .collect();
        for &token in &unused {
            if let Some(entry) = self.entries.remove(token) {
                self.by_signature.remove(&entry.signature());
            }
            self.usage.remove(token);
        }
        unused.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecipeToken, &Arc<RecipeStorage>)> {
        self.entries.iter()
    }
}
