//! Recipe packs: a directory of recipe files, one definition per file.
//!
//! A file at `<dir>/baker/bread.json` declares the recipe
//! `<namespace>:baker/bread`. Definitions are applied in path order, then
//! removal directives, so a removal can target a recipe from any file of
//! the pack or from an earlier pack.

use crate::loader::{DataLoadError, collect_data_files, read_value};
use colony_core::book::{BookChange, RecipeBook};
use colony_core::id::ResourceId;
use colony_core::parse::parse_recipe;
use colony_core::recipe::RecipeDirective;
use colony_core::registry::ItemRegistry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// What loading one pack did to the book.
#[derive(Debug, Default)]
pub struct PackSummary {
    pub files: usize,
    pub added: usize,
    pub replaced: usize,
    /// Definitions dropped as structural duplicates of one already held by
    /// the same crafter.
    pub duplicates: usize,
    pub removed: usize,
    /// Removal directives whose target was not in the book.
    pub missing: usize,
    /// Files that parsed but held no usable recipe. They are skipped.
    pub rejected: Vec<DataLoadError>,
}

impl PackSummary {
    fn record(&mut self, change: &BookChange) {
        match change {
            BookChange::Added => self.added += 1,
            BookChange::Replaced => self.replaced += 1,
            BookChange::Duplicate { .. } => self.duplicates += 1,
            BookChange::Removed => self.removed += 1,
            BookChange::Missing => self.missing += 1,
        }
    }
}

/// Recipe id for a file inside the pack directory.
pub fn recipe_id(dir: &Path, file: &Path, namespace: &str) -> Option<ResourceId> {
    let relative = file.strip_prefix(dir).ok()?.with_extension("");
    let path = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?
        .join("/");
    if path.is_empty() || path.contains(':') {
        return None;
    }
    Some(ResourceId::new(namespace, path))
}

/// Load every recipe file under `dir` into `book`.
///
/// Unreadable or syntactically invalid files abort the load. Files that
/// parse but describe no usable recipe are logged and listed in
/// [`PackSummary::rejected`].
pub fn load_recipe_pack(
    dir: &Path,
    namespace: &str,
    registry: &ItemRegistry,
    book: &mut RecipeBook,
) -> Result<PackSummary, DataLoadError> {
    let files = collect_data_files(dir)?;
    let mut summary = PackSummary {
        files: files.len(),
        ..PackSummary::default()
    };
    let mut seen: HashMap<ResourceId, PathBuf> = HashMap::new();
    let mut removals = Vec::new();

    for file in files {
        let id = recipe_id(dir, &file, namespace).ok_or_else(|| DataLoadError::Parse {
            file: file.clone(),
            detail: "file name is not a valid recipe id".to_string(),
        })?;
        if let Some(other) = seen.insert(id.clone(), file.clone()) {
            return Err(DataLoadError::ConflictingFormats { a: other, b: file });
        }

        let value = read_value(&file)?;
        match parse_recipe(id, &value, registry) {
            Ok(directive @ RecipeDirective::Remove { .. }) => removals.push(directive),
            Ok(directive) => summary.record(&book.apply(directive)),
            Err(source) => {
                tracing::warn!(file = %file.display(), error = %source, "skipping malformed recipe");
                summary.rejected.push(DataLoadError::Recipe { file, source });
            }
        }
    }
    for directive in removals {
        summary.record(&book.apply(directive));
    }

    tracing::info!(
        dir = %dir.display(),
        files = summary.files,
        added = summary.added,
        replaced = summary.replaced,
        duplicates = summary.duplicates,
        removed = summary.removed,
        rejected = summary.rejected.len(),
        "recipe pack loaded"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::tests::{cleanup, make_test_dir};
    use colony_core::test_utils::*;
    use std::fs;

    const BREAD_JSON: &str = r#"{
        "type": "recipe",
        "crafter": "baker",
        "inputs": [{ "item": "minecraft:wheat", "count": 3 }],
        "result": "minecraft:bread"
    }"#;

    #[test]
    fn recipe_ids_follow_relative_paths() {
        let dir = Path::new("/packs/colony");
        assert_eq!(
            recipe_id(dir, &dir.join("baker/bread.json"), "colony"),
            Some(rid("baker/bread"))
        );
        assert_eq!(recipe_id(dir, Path::new("/elsewhere/bread.json"), "colony"), None);
    }

    #[test]
    fn pack_loads_all_formats() {
        let dir = make_test_dir("pack_formats");
        fs::create_dir_all(dir.join("baker")).unwrap();
        fs::write(dir.join("baker/bread.json"), BREAD_JSON).unwrap();
        fs::write(
            dir.join("torch.ron"),
            r#"{
                "crafter": "blacksmith",
                "inputs": [(item: "minecraft:stick", count: 2)],
                "result": "minecraft:torch",
                "count": 4,
                "min-building-level": 1,
            }"#,
        )
        .unwrap();
        fs::write(
            dir.join("planks.toml"),
            "crafter = \"sawmill\"\nresult = \"minecraft:oak_planks\"\ncount = 4\n\n[[inputs]]\nitem = \"minecraft:oak_log\"\ncount = 1\n",
        )
        .unwrap();

        let mut book = RecipeBook::new();
        let summary = load_recipe_pack(&dir, "colony", &test_registry(), &mut book).unwrap();
        assert_eq!(summary.files, 3);
        assert_eq!(summary.added, 3);
        assert!(summary.rejected.is_empty());

        let torch_def = book.get(&rid("torch")).unwrap();
        assert_eq!(torch_def.crafter(), "blacksmith");
        assert_eq!(torch_def.result().count, 4);
        assert_eq!(torch_def.min_level(), 1);
        assert!(book.get(&rid("baker/bread")).is_some());
        assert_eq!(book.for_crafter("sawmill").count(), 1);

        cleanup(&dir);
    }

    #[test]
    fn removals_apply_after_definitions() {
        let dir = make_test_dir("pack_remove");
        // Sorts before the file it removes.
        fs::write(
            dir.join("a_remove.json"),
            r#"{ "type": "remove", "recipe-id-to-remove": "colony:bread" }"#,
        )
        .unwrap();
        fs::write(dir.join("bread.json"), BREAD_JSON).unwrap();
        fs::write(
            dir.join("z_remove.json"),
            r#"{ "type": "remove", "recipe-id-to-remove": "colony:cake" }"#,
        )
        .unwrap();

        let mut book = RecipeBook::new();
        let summary = load_recipe_pack(&dir, "colony", &test_registry(), &mut book).unwrap();
        assert_eq!(summary.added, 1);
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.missing, 1);
        assert!(book.is_empty());

        cleanup(&dir);
    }

    #[test]
    fn malformed_recipes_are_skipped() {
        let dir = make_test_dir("pack_malformed");
        fs::write(dir.join("bread.json"), BREAD_JSON).unwrap();
        fs::write(dir.join("nothing.json"), r#"{ "crafter": "baker" }"#).unwrap();

        let mut book = RecipeBook::new();
        let summary = load_recipe_pack(&dir, "colony", &test_registry(), &mut book).unwrap();
        assert_eq!(summary.added, 1);
        assert_eq!(summary.rejected.len(), 1);
        assert!(matches!(&summary.rejected[0], DataLoadError::Recipe { file, .. } if file.ends_with("nothing.json")));

        cleanup(&dir);
    }

    #[test]
    fn syntax_errors_abort_the_load() {
        let dir = make_test_dir("pack_syntax");
        fs::write(dir.join("bread.json"), "{ not json").unwrap();

        let mut book = RecipeBook::new();
        let result = load_recipe_pack(&dir, "colony", &test_registry(), &mut book);
        assert!(matches!(result, Err(DataLoadError::Parse { .. })));

        cleanup(&dir);
    }

    #[test]
    fn same_stem_in_two_formats_conflicts() {
        let dir = make_test_dir("pack_conflict");
        fs::write(dir.join("bread.json"), BREAD_JSON).unwrap();
        fs::write(dir.join("bread.ron"), "()").unwrap();

        let mut book = RecipeBook::new();
        let result = load_recipe_pack(&dir, "colony", &test_registry(), &mut book);
        assert!(matches!(result, Err(DataLoadError::ConflictingFormats { .. })));

        cleanup(&dir);
    }
}
