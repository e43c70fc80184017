//! # Block Store
//!
//! The authoritative set of Block entities.
//!
//! Uses `BTreeMap` keyed by monotonically assigned ids, so iteration
//! order is creation order. Name lookup deliberately takes the first
//! match in that order: duplicate names are allowed and first-match-wins
//! is the observed product behavior.

use crate::formats::StoredBlock;
use crate::types::{Block, BlockId, BlockKind};
use std::collections::BTreeMap;

/// Owns every block in a document.
#[derive(Debug, Clone, Default)]
pub struct BlockStore {
    /// Block storage: BlockId -> Block, iterated in creation order.
    blocks: BTreeMap<BlockId, Block>,

    /// Next available id. Never decremented, so ids are never reused.
    next_id: u64,
}

impl BlockStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a block of the given kind and return its id.
    ///
    /// When no name is supplied the block gets the original naming
    /// scheme `kind-id` (e.g. `text-7`).
    pub fn create(&mut self, kind: BlockKind, name: Option<String>) -> BlockId {
        let id = BlockId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);

        let name = name.unwrap_or_else(|| format!("{}-{}", kind.name_prefix(), id.0));
        self.blocks.insert(id, Block::new(id, name, kind));
        id
    }

    /// Load a stripped document, replacing all current blocks.
    ///
    /// Results, cached combined data, and scheduler bookkeeping do not
    /// survive persistence; loaded blocks start fresh. Returns the new
    /// ids in document order.
    pub fn load_document(&mut self, stored: &[StoredBlock]) -> Vec<BlockId> {
        self.blocks.clear();

        stored
            .iter()
            .map(|sb| {
                let id = self.create(sb.kind, Some(sb.name.clone()));
                if let Some(block) = self.blocks.get_mut(&id) {
                    block.data = sb.data.clone();
                    block.instructions = sb.instructions.clone();
                    block.interaction_state = sb.interaction_state;
                }
                id
            })
            .collect()
    }

    /// Export the stripped document form of every block, in order.
    #[must_use]
    pub fn export_document(&self) -> Vec<StoredBlock> {
        self.blocks.values().map(StoredBlock::from).collect()
    }

    /// Lookup a block by id.
    #[must_use]
    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    /// Mutable lookup by id.
    pub fn get_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.blocks.get_mut(&id)
    }

    /// Remove a block. Returns the removed block if it existed.
    pub fn remove(&mut self, id: BlockId) -> Option<Block> {
        self.blocks.remove(&id)
    }

    /// Check whether a block exists.
    #[must_use]
    pub fn contains(&self, id: BlockId) -> bool {
        self.blocks.contains_key(&id)
    }

    /// First block with the given name, in creation order.
    ///
    /// Will return the first match and ignore the rest; duplicate names
    /// are an acknowledged ambiguity.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<&Block> {
        self.blocks.values().find(|b| b.name == name)
    }

    /// All block ids in creation order.
    #[must_use]
    pub fn ids(&self) -> Vec<BlockId> {
        self.blocks.keys().copied().collect()
    }

    /// Iterate blocks in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.values()
    }

    /// Number of blocks in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn create_assigns_monotonic_ids() {
        let mut store = BlockStore::new();
        let a = store.create(BlockKind::Text, None);
        let b = store.create(BlockKind::Static, None);
        assert!(a < b);
    }

    #[test]
    fn default_names_use_kind_prefix() {
        let mut store = BlockStore::new();
        let id = store.create(BlockKind::Image, None);
        let block = store.get(id).expect("block");
        assert_eq!(block.name, format!("image-{}", id.0));
    }

    #[test]
    fn ids_are_not_reused_after_removal() {
        let mut store = BlockStore::new();
        let a = store.create(BlockKind::Text, None);
        store.remove(a);
        let b = store.create(BlockKind::Text, None);
        assert_ne!(a, b);
    }

    #[test]
    fn find_by_name_returns_first_match() {
        let mut store = BlockStore::new();
        let first = store.create(BlockKind::Text, Some("dup".to_string()));
        let _second = store.create(BlockKind::Static, Some("dup".to_string()));

        let found = store.find_by_name("dup").expect("found");
        assert_eq!(found.id, first);
    }

    #[test]
    fn load_document_replaces_existing_blocks() {
        let mut store = BlockStore::new();
        store.create(BlockKind::Text, Some("old".to_string()));

        let stored = vec![
            StoredBlock {
                name: "a".to_string(),
                kind: BlockKind::Static,
                data: "hello".to_string(),
                instructions: String::new(),
                interaction_state: Default::default(),
            },
            StoredBlock {
                name: "b".to_string(),
                kind: BlockKind::Text,
                data: "#a world".to_string(),
                instructions: "uppercase".to_string(),
                interaction_state: Default::default(),
            },
        ];

        let ids = store.load_document(&stored);
        assert_eq!(ids.len(), 2);
        assert_eq!(store.len(), 2);
        assert!(store.find_by_name("old").is_none());

        let b = store.find_by_name("b").expect("b");
        assert_eq!(b.data, "#a world");
        assert_eq!(b.instructions, "uppercase");
        assert!(b.result.is_none());
    }

    #[test]
    fn export_roundtrips_stripped_fields() {
        let mut store = BlockStore::new();
        let id = store.create(BlockKind::Text, Some("a".to_string()));
        if let Some(block) = store.get_mut(id) {
            block.data = "data".to_string();
            block.instructions = "summarize".to_string();
            block.result = Some(crate::types::TransformResult::Text("out".to_string()));
        }

        let doc = store.export_document();
        assert_eq!(doc.len(), 1);
        assert_eq!(doc[0].name, "a");
        assert_eq!(doc[0].data, "data");

        let mut restored = BlockStore::new();
        restored.load_document(&doc);
        let block = restored.find_by_name("a").expect("a");
        // Results are not persisted
        assert!(block.result.is_none());
    }
}
