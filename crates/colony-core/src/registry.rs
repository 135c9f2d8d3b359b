use crate::id::{BlockKind, ItemKind, ResourceId};
use std::collections::HashMap;

/// An item kind definition in the registry.
#[derive(Debug, Clone)]
pub struct ItemDef {
    pub id: ResourceId,
    /// Translation key shown in views.
    pub display_key: String,
}

/// Builder for constructing an immutable [`ItemRegistry`].
///
/// Index 0 of both tables is reserved: [`ItemKind::EMPTY`] and
/// [`BlockKind::AIR`].
#[derive(Debug)]
pub struct RegistryBuilder {
    items: Vec<ItemDef>,
    item_ids: HashMap<ResourceId, ItemKind>,
    blocks: Vec<ResourceId>,
    block_ids: HashMap<ResourceId, BlockKind>,
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryBuilder {
    pub fn new() -> Self {
        let air = ResourceId::new("minecraft", "air");
        let mut builder = Self {
            items: Vec::new(),
            item_ids: HashMap::new(),
            blocks: Vec::new(),
            block_ids: HashMap::new(),
        };
        builder.items.push(ItemDef {
            id: air.clone(),
            display_key: "block.minecraft.air".to_string(),
        });
        builder.item_ids.insert(air.clone(), ItemKind::EMPTY);
        builder.blocks.push(air.clone());
        builder.block_ids.insert(air, BlockKind::AIR);
        builder
    }

    /// Register an item kind. Re-registering an id returns the existing kind.
    pub fn register_item(&mut self, id: ResourceId) -> ItemKind {
        if let Some(&kind) = self.item_ids.get(&id) {
            return kind;
        }
        let kind = ItemKind(self.items.len() as u32);
        let display_key = format!("item.{}.{}", id.namespace, id.path);
        self.items.push(ItemDef {
            id: id.clone(),
            display_key,
        });
        self.item_ids.insert(id, kind);
        kind
    }

    /// Register a block kind. Re-registering an id returns the existing kind.
    pub fn register_block(&mut self, id: ResourceId) -> BlockKind {
        if let Some(&kind) = self.block_ids.get(&id) {
            return kind;
        }
        let kind = BlockKind(self.blocks.len() as u32);
        self.blocks.push(id.clone());
        self.block_ids.insert(id, kind);
        kind
    }

    /// Override the display key of an already registered item.
    pub fn set_display_key(&mut self, id: &ResourceId, key: &str) -> Result<(), RegistryError> {
        let kind = self
            .item_ids
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        self.items[kind.0 as usize].display_key = key.to_string();
        Ok(())
    }

    /// Convenience for registering `namespace:path` text.
    pub fn item(&mut self, text: &str) -> Result<ItemKind, RegistryError> {
        let id = ResourceId::parse(text).ok_or_else(|| RegistryError::InvalidId(text.to_string()))?;
        Ok(self.register_item(id))
    }

    /// Convenience for registering `namespace:path` block text.
    pub fn block(&mut self, text: &str) -> Result<BlockKind, RegistryError> {
        let id = ResourceId::parse(text).ok_or_else(|| RegistryError::InvalidId(text.to_string()))?;
        Ok(self.register_block(id))
    }

    /// Finalize and build the immutable registry.
    pub fn build(self) -> ItemRegistry {
        ItemRegistry {
            items: self.items,
            item_ids: self.item_ids,
            blocks: self.blocks,
            block_ids: self.block_ids,
        }
    }
}

/// Immutable item/block registry. Frozen after build().
#[derive(Debug)]
pub struct ItemRegistry {
    items: Vec<ItemDef>,
    item_ids: HashMap<ResourceId, ItemKind>,
    blocks: Vec<ResourceId>,
    block_ids: HashMap<ResourceId, BlockKind>,
}

impl ItemRegistry {
    pub fn item(&self, id: &ResourceId) -> Option<ItemKind> {
        self.item_ids.get(id).copied()
    }

    pub fn block(&self, id: &ResourceId) -> Option<BlockKind> {
        self.block_ids.get(id).copied()
    }

    pub fn get_item(&self, kind: ItemKind) -> Option<&ItemDef> {
        self.items.get(kind.0 as usize)
    }

    pub fn get_block(&self, kind: BlockKind) -> Option<&ResourceId> {
        self.blocks.get(kind.0 as usize)
    }

    /// Registry id of an item kind, used by the view codec.
    pub fn item_id(&self, kind: ItemKind) -> Option<&ResourceId> {
        self.get_item(kind).map(|def| &def.id)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid resource id: {0}")]
    InvalidId(String),
}
