use crate::id::ItemKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Structured tag data attached to a stack (e.g. a potion type).
/// Keys and values are kept as text; ordering is canonical.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemTag(pub BTreeMap<String, String>);

impl ItemTag {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A stack of items of one kind, optionally tagged.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemStack {
    pub kind: ItemKind,
    pub count: u32,
    #[serde(default)]
    pub tag: Option<ItemTag>,
}

impl ItemStack {
    pub fn new(kind: ItemKind, count: u32) -> Self {
        Self {
            kind,
            count,
            tag: None,
        }
    }

    pub fn with_tag(mut self, tag: ItemTag) -> Self {
        self.tag = if tag.is_empty() { None } else { Some(tag) };
        self
    }

    /// The placeholder produced for unresolvable item references.
    pub fn empty() -> Self {
        Self::new(ItemKind::EMPTY, 0)
    }

    pub fn is_empty(&self) -> bool {
        self.kind == ItemKind::EMPTY || self.count == 0
    }

    /// Stands in for an item reference that did not resolve.
    pub fn is_placeholder(&self) -> bool {
        self.kind == ItemKind::EMPTY
    }

    /// Same kind and tag, ignoring the stack size.
    pub fn same_item(&self, other: &ItemStack) -> bool {
        self.kind == other.kind && self.tag == other.tag
    }

    /// Copy of this stack with a different count.
    pub fn with_count(&self, count: u32) -> Self {
        Self {
            kind: self.kind,
            count,
            tag: self.tag.clone(),
        }
    }
}

/// Merge stacks of the same item (kind + tag) and sort them canonically.
/// Two input lists describe the same multiset iff their cleaned forms are equal.
pub fn clean_stacks(stacks: &[ItemStack]) -> Vec<ItemStack> {
    let mut merged: BTreeMap<(ItemKind, Option<ItemTag>), u32> = BTreeMap::new();
    for stack in stacks.iter().filter(|s| !s.is_empty()) {
        *merged.entry((stack.kind, stack.tag.clone())).or_insert(0) += stack.count;
    }
    merged
        .into_iter()
        .map(|((kind, tag), count)| ItemStack { kind, count, tag })
        .collect()
}

/// True if every item in `a` appears (ignoring counts) in `b`.
pub fn contains_all_items(a: &[ItemStack], b: &[ItemStack]) -> bool {
    a.iter().all(|x| b.iter().any(|y| x.same_item(y)))
}

/// "Give me items matching this" half of a deliverable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackPredicate {
    pub kind: ItemKind,
    /// Required tag. Only consulted when `match_tag` is set.
    pub tag: Option<ItemTag>,
    pub match_tag: bool,
}

impl StackPredicate {
    /// Match any stack of this kind regardless of tag.
    pub fn kind(kind: ItemKind) -> Self {
        Self {
            kind,
            tag: None,
            match_tag: false,
        }
    }

    /// Match the exact item (kind and tag) of `stack`.
    pub fn exact(stack: &ItemStack) -> Self {
        Self {
            kind: stack.kind,
            tag: stack.tag.clone(),
            match_tag: true,
        }
    }

    pub fn matches(&self, stack: &ItemStack) -> bool {
        !stack.is_empty()
            && stack.kind == self.kind
            && (!self.match_tag || stack.tag == self.tag)
    }

    /// Some stack satisfies both predicates. Two tag-matching predicates
    /// of the same kind only overlap when their tags agree.
    pub fn overlaps(&self, other: &StackPredicate) -> bool {
        self.kind == other.kind && (!self.match_tag || !other.match_tag || self.tag == other.tag)
    }
}

/// Accessible item storage of a building or a colony warehouse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub stacks: Vec<ItemStack>,
    /// Maximum total items. `None` means unbounded.
    pub capacity: Option<u32>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            stacks: Vec::new(),
            capacity: Some(capacity),
        }
    }

    /// Add items. Returns the amount that didn't fit.
    #[must_use = "overflow count indicates items that did not fit"]
    pub fn add(&mut self, stack: &ItemStack) -> u32 {
        if stack.is_empty() {
            return 0;
        }
        let to_add = match self.capacity {
            Some(capacity) => stack.count.min(capacity.saturating_sub(self.total())),
            None => stack.count,
        };
        let overflow = stack.count - to_add;

        if to_add > 0 {
            if let Some(existing) = self.stacks.iter_mut().find(|s| s.same_item(stack)) {
                existing.count += to_add;
            } else {
                self.stacks.push(stack.with_count(to_add));
            }
        }

        overflow
    }

    /// Remove up to `quantity` of the exact item. Returns the amount removed.
    #[must_use = "returns the quantity actually removed, which may be less than requested"]
    pub fn remove(&mut self, item: &ItemStack, quantity: u32) -> u32 {
        let Some(existing) = self.stacks.iter_mut().find(|s| s.same_item(item)) else {
            return 0;
        };
        let removed = quantity.min(existing.count);
        existing.count -= removed;
        if existing.count == 0 {
            self.stacks.retain(|s| s.count > 0);
        }
        removed
    }

    /// Remove up to `quantity` items matching `predicate`, taking from
    /// stacks in storage order. Returns the stacks taken.
    pub fn take_matching(&mut self, predicate: &StackPredicate, quantity: u32) -> Vec<ItemStack> {
        let mut taken = Vec::new();
        let mut remaining = quantity;
        for stack in self.stacks.iter_mut() {
            if remaining == 0 {
                break;
            }
            if predicate.matches(stack) {
                let n = remaining.min(stack.count);
                stack.count -= n;
                remaining -= n;
                taken.push(stack.with_count(n));
            }
        }
        self.stacks.retain(|s| s.count > 0);
        taken
    }

    /// Quantity of the exact item (kind and tag).
    pub fn count_of(&self, item: &ItemStack) -> u32 {
        self.stacks
            .iter()
            .filter(|s| s.same_item(item))
            .map(|s| s.count)
            .sum()
    }

    /// Quantity of all stacks matching `predicate`.
    pub fn count_matching(&self, predicate: &StackPredicate) -> u32 {
        self.stacks
            .iter()
            .filter(|s| predicate.matches(s))
            .map(|s| s.count)
            .sum()
    }

    /// Total items across all kinds.
    pub fn total(&self) -> u32 {
        self.stacks.iter().map(|s| s.count).sum()
    }
}
