use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;

new_key_type! {
    /// Opaque token identifying a request in a colony's request graph.
    pub struct RequestId;

    /// Identifies a worker building inside a colony.
    pub struct BuildingId;

    /// Identifies a resolved recipe entry in the recipe store.
    pub struct RecipeToken;
}

/// Identifies a colony. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColonyId(pub u32);

/// Identifies an item kind in the item registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemKind(pub u32);

impl ItemKind {
    /// The empty placeholder kind. Always registered at index 0.
    pub const EMPTY: ItemKind = ItemKind(0);
}

/// Identifies a block kind (crafting stations used as intermediates).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockKind(pub u32);

impl BlockKind {
    /// "No block". Always registered at index 0.
    pub const AIR: BlockKind = BlockKind(0);
}

/// Identifies a resolver by its position in the resolver registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResolverId(pub u32);

/// Namespace used when an identifier omits one.
pub const DEFAULT_NAMESPACE: &str = "minecraft";

/// A `namespace:path` identifier for recipes, research, loot tables and
/// registry entries.
///
/// Serialized as its `namespace:path` text so it can key maps in data files.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ResourceId {
    pub namespace: String,
    pub path: String,
}

impl ResourceId {
    pub fn new(namespace: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            path: path.into(),
        }
    }

    /// Parse `namespace:path`, or `path` in the default namespace.
    /// Returns `None` when the text has more than one separator or an
    /// empty component.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split(':');
        let first = parts.next()?;
        let id = match (parts.next(), parts.next()) {
            (None, _) => Self::new(DEFAULT_NAMESPACE, first),
            (Some(path), None) => Self::new(first, path),
            (Some(_), Some(_)) => return None,
        };
        if id.namespace.is_empty() || id.path.is_empty() {
            return None;
        }
        Some(id)
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for ResourceId {
    type Error = String;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::parse(&text).ok_or_else(|| format!("invalid resource id `{text}`"))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}
