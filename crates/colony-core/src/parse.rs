//! Parsing raw recipe data into [`RecipeDirective`]s.
//!
//! Recipe files are key-value objects (JSON, or RON/TOML converted to a JSON
//! value by the data crate). Item references look like `namespace:id` or
//! `namespace:id{Key=value,...}`; the namespace defaults to `minecraft`.
//!
//! Problems with individual items (unknown ids, bad tags, bad counts) are
//! logged and the field falls back to a default. Only problems that leave the
//! recipe meaningless are returned as [`MalformedRecipeError`].

use crate::id::{BlockKind, ResourceId};
use crate::item::{ItemStack, ItemTag};
use crate::recipe::{MalformedRecipeError, RecipeBuilder, RecipeDirective, RecipeType};
use crate::registry::ItemRegistry;
use serde_json::Value;
use std::collections::BTreeMap;

pub const TYPE_PROP: &str = "type";
pub const CRAFTER_PROP: &str = "crafter";
pub const INPUTS_PROP: &str = "inputs";
pub const RESULT_PROP: &str = "result";
pub const COUNT_PROP: &str = "count";
pub const ITEM_PROP: &str = "item";
pub const SECONDARY_PROP: &str = "additional-output";
pub const ALTERNATE_PROP: &str = "alternate-output";
pub const LOOT_TABLE_PROP: &str = "loot-table";
pub const INTERMEDIATE_PROP: &str = "intermediate";
pub const RESEARCH_ID_PROP: &str = "research-id";
pub const EXCLUDED_RESEARCH_ID_PROP: &str = "not-research-id";
pub const MIN_LEVEL_PROP: &str = "min-building-level";
pub const MAX_LEVEL_PROP: &str = "max-building-level";
pub const MUST_EXIST_PROP: &str = "must-exist";
pub const REMOVE_ID_PROP: &str = "recipe-id-to-remove";

pub const TYPE_RECIPE: &str = "recipe";
pub const TYPE_MULTI_OUTPUT: &str = "recipe-multi-out";
pub const TYPE_MULTI_INPUT: &str = "recipe-multi-in";
pub const TYPE_REMOVE: &str = "remove";

/// Parse one recipe object.
pub fn parse_recipe(
    id: ResourceId,
    json: &Value,
    registry: &ItemRegistry,
) -> Result<RecipeDirective, MalformedRecipeError> {
    let Some(obj) = json.as_object() else {
        return Err(MalformedRecipeError::new(&id, "recipe", "expected an object"));
    };

    let kind = match obj.get(TYPE_PROP) {
        None => TYPE_RECIPE,
        Some(Value::String(s)) => s.as_str(),
        Some(_) => return Err(MalformedRecipeError::new(&id, "type", "expected a string")),
    };
    let recipe_type = match kind {
        TYPE_RECIPE => RecipeType::Classic,
        TYPE_MULTI_OUTPUT => RecipeType::MultiOutput,
        TYPE_MULTI_INPUT => RecipeType::MultiInput,
        TYPE_REMOVE => {
            let target = obj
                .get(REMOVE_ID_PROP)
                .and_then(Value::as_str)
                .and_then(ResourceId::parse)
                .ok_or_else(|| {
                    MalformedRecipeError::new(&id, "recipe-id-to-remove", "missing or invalid id")
                })?;
            return Ok(RecipeDirective::Remove { id, target });
        }
        other => {
            return Err(MalformedRecipeError::new(
                &id,
                "type",
                format!("unknown recipe type `{other}`"),
            ));
        }
    };

    let mut result = match obj.get(RESULT_PROP) {
        None => ItemStack::empty(),
        Some(value) => parse_stack_value(value, registry),
    };
    if let Some(count) = obj.get(COUNT_PROP)
        && !result.is_empty()
    {
        result.count = parse_count(count, &id);
    }

    let mut builder = RecipeBuilder::new(id.clone(), result).recipe_type(recipe_type);

    match obj.get(CRAFTER_PROP) {
        None => {}
        Some(Value::String(crafter)) => builder = builder.crafter(crafter),
        Some(other) => {
            tracing::warn!(recipe = %id, value = %other, "crafter is not a string, using default")
        }
    }

    builder = builder.inputs(parse_stack_list(obj.get(INPUTS_PROP), INPUTS_PROP, &id, registry));
    for stack in parse_stack_list(obj.get(SECONDARY_PROP), SECONDARY_PROP, &id, registry) {
        builder = builder.secondary(stack);
    }
    for stack in parse_stack_list(obj.get(ALTERNATE_PROP), ALTERNATE_PROP, &id, registry) {
        builder = builder.alternate(stack);
    }

    if let Some(value) = obj.get(LOOT_TABLE_PROP) {
        match value.as_str().and_then(ResourceId::parse) {
            Some(table) => builder = builder.loot_table(table),
            None => tracing::warn!(recipe = %id, value = %value, "invalid loot table id, ignoring"),
        }
    }

    if let Some(value) = obj.get(INTERMEDIATE_PROP) {
        builder = builder.intermediate(parse_block(value, &id, registry));
    }

    if let Some(research) = parse_research_id(obj.get(RESEARCH_ID_PROP), RESEARCH_ID_PROP, &id)? {
        builder = builder.research(research);
    }
    if let Some(research) = parse_research_id(
        obj.get(EXCLUDED_RESEARCH_ID_PROP),
        EXCLUDED_RESEARCH_ID_PROP,
        &id,
    )? {
        builder = builder.excluded_research(research);
    }

    if let Some(value) = obj.get(MIN_LEVEL_PROP) {
        match value.as_u64().and_then(|v| u32::try_from(v).ok()) {
            Some(level) => builder = builder.min_level(level),
            None => {
                tracing::warn!(
                    recipe = %id,
                    value = %value,
                    "invalid min-building-level, using default"
                )
            }
        }
    }
    if let Some(value) = obj.get(MAX_LEVEL_PROP) {
        match value.as_u64().and_then(|v| u32::try_from(v).ok()) {
            Some(level) => builder = builder.max_level(level),
            None => {
                tracing::warn!(
                    recipe = %id,
                    value = %value,
                    "invalid max-building-level, using default"
                )
            }
        }
    }
    if let Some(value) = obj.get(MUST_EXIST_PROP) {
        match value.as_bool() {
            Some(flag) => builder = builder.must_exist(flag),
            None => {
                tracing::warn!(
                    recipe = %id,
                    value = %value,
                    "must-exist is not a boolean, using false"
                )
            }
        }
    }

    builder.build().map(RecipeDirective::Define)
}

fn parse_research_id(
    value: Option<&Value>,
    field: &'static str,
    recipe: &ResourceId,
) -> Result<Option<ResourceId>, MalformedRecipeError> {
    let Some(value) = value else {
        return Ok(None);
    };
    value
        .as_str()
        .and_then(ResourceId::parse)
        .map(Some)
        .ok_or_else(|| {
            MalformedRecipeError::new(recipe, field, format!("invalid research id {value}"))
        })
}

fn parse_block(value: &Value, recipe: &ResourceId, registry: &ItemRegistry) -> BlockKind {
    let block = value
        .as_str()
        .and_then(ResourceId::parse)
        .and_then(|id| registry.block(&id));
    match block {
        Some(block) => block,
        None => {
            tracing::warn!(
                recipe = %recipe,
                value = %value,
                "unknown intermediate block, using air"
            );
            BlockKind::AIR
        }
    }
}

/// A list of `{item, count}` objects. Non-object entries and entries without
/// an `item` are skipped.
fn parse_stack_list(
    value: Option<&Value>,
    field: &str,
    recipe: &ResourceId,
    registry: &ItemRegistry,
) -> Vec<ItemStack> {
    let Some(value) = value else {
        return Vec::new();
    };
    let Some(entries) = value.as_array() else {
        tracing::warn!(recipe = %recipe, field, "expected an array, ignoring");
        return Vec::new();
    };
    entries
        .iter()
        .filter(|entry| entry.get(ITEM_PROP).is_some())
        .map(|entry| parse_stack_value(entry, registry))
        .collect()
}

/// A stack given either as an item string or as `{item, count}`.
fn parse_stack_value(value: &Value, registry: &ItemRegistry) -> ItemStack {
    match value {
        Value::String(text) => parse_item(text, registry),
        Value::Object(obj) => {
            let Some(text) = obj.get(ITEM_PROP).and_then(Value::as_str) else {
                tracing::warn!(value = %value, "stack without an item string");
                return ItemStack::empty();
            };
            let mut stack = parse_item(text, registry);
            if let Some(count) = obj.get(COUNT_PROP)
                && !stack.is_empty()
            {
                stack.count = parse_count_for(count, text);
            }
            stack
        }
        other => {
            tracing::warn!(value = %other, "unexpected stack value");
            ItemStack::empty()
        }
    }
}

fn parse_count(value: &Value, recipe: &ResourceId) -> u32 {
    parse_count_for(value, &recipe.to_string())
}

fn parse_count_for(value: &Value, context: &str) -> u32 {
    match value.as_u64().and_then(|v| u32::try_from(v).ok()) {
        Some(count) => count,
        None => {
            tracing::warn!(context, value = %value, "malformed count, using 0");
            0
        }
    }
}

/// Resolve an item reference (`ns:id` or `ns:id{tag}`) to a stack of one.
///
/// Returns the empty stack for references with more than one separator or
/// items missing from the registry. A malformed tag is dropped.
pub fn parse_item(text: &str, registry: &ItemRegistry) -> ItemStack {
    let (id_text, tag_text) = match text.find('{') {
        Some(index) if index > 0 => (&text[..index], Some(&text[index..])),
        _ => (text, None),
    };

    if id_text.matches(':').count() > 1 {
        tracing::error!(item = text, "unable to parse item definition");
        return ItemStack::empty();
    }
    let Some(id) = ResourceId::parse(id_text) else {
        tracing::error!(item = text, "unable to parse item definition");
        return ItemStack::empty();
    };
    let Some(kind) = registry.item(&id) else {
        tracing::warn!(item = text, "parsed item definition returned empty");
        return ItemStack::empty();
    };

    let mut stack = ItemStack::new(kind, 1);
    if let Some(tag_text) = tag_text {
        match parse_tag(tag_text) {
            Some(tag) => stack = stack.with_tag(tag),
            None => tracing::warn!(item = text, "unable to parse item tag, dropping it"),
        }
    }
    stack
}

/// Parse `{Key=value,Other:"quoted"}` tag text.
pub fn parse_tag(text: &str) -> Option<ItemTag> {
    let body = text.strip_prefix('{')?.strip_suffix('}')?.trim();
    let mut map = BTreeMap::new();
    if body.is_empty() {
        return Some(ItemTag(map));
    }
    for pair in body.split(',') {
        let pair = pair.trim();
        // `=` takes precedence so values may contain `:`.
        let (key, value) = pair.split_once('=').or_else(|| pair.split_once(':'))?;
        let key = key.trim();
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        if key.is_empty() || value.is_empty() || value.contains('{') || value.contains('"') {
            return None;
        }
        map.insert(key.to_string(), value.to_string());
    }
    Some(ItemTag(map))
}
