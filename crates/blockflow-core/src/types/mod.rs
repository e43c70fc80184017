//! # Core Type Definitions
//!
//! This module contains all core types for the Blockflow engine:
//! - Block identifiers (`BlockId`)
//! - The block entity itself (`Block`, `BlockKind`, `InteractionState`,
//!   `TransformResult`)
//! - Error types (`BlockflowError`, `CycleError`)
//!
//! ## Determinism Guarantees
//!
//! All identifier types implement `Ord` so `BTreeMap`/`BTreeSet`
//! iteration is deterministic, and ids are assigned monotonically so
//! iteration order equals creation order.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;

// =============================================================================
// BLOCK IDENTIFIER
// =============================================================================

/// Unique identifier for a block.
///
/// Assigned monotonically by the [`crate::store::BlockStore`] at
/// creation, stable for the block's lifetime and never reused while the
/// store lives. Because ids only grow, id order is creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockId(pub u64);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// BLOCK KIND
// =============================================================================

/// What a block does with its combined data.
///
/// `Separator` blocks are layout-only: they never enter the dependency
/// graph and are never scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    /// Result is the combined data itself, computed synchronously.
    Static,
    /// Result is produced by the text Transform Service.
    Text,
    /// Result is produced by the image Transform Service.
    Image,
    /// Visual divider; no data, no result, no graph node.
    Separator,
}

impl BlockKind {
    /// Kinds that participate in the dependency graph and scheduling.
    #[must_use]
    pub const fn is_computable(self) -> bool {
        !matches!(self, Self::Separator)
    }

    /// Prefix used for default block names (`text-7`, `image-12`, ...).
    #[must_use]
    pub const fn name_prefix(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Text => "text",
            Self::Image => "image",
            Self::Separator => "separator",
        }
    }
}

// =============================================================================
// INTERACTION STATE
// =============================================================================

/// Which of a block's fields the user may currently edit.
///
/// Purely presentational; scheduling ignores it entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionState {
    /// All fields editable.
    #[default]
    Open,
    /// Only the data field editable.
    Entry,
    /// Nothing editable.
    Locked,
}

// =============================================================================
// TRANSFORM RESULT
// =============================================================================

/// A block's computed output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformResult {
    /// Output of the text Transform Service, or a static block's
    /// combined data.
    Text(String),
    /// Binary image payload from the image Transform Service.
    Image(Vec<u8>),
}

impl TransformResult {
    /// The textual form substituted into consumers' data.
    ///
    /// Image payloads have no textual substitution form; consumers of an
    /// image block see its reference left literal.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Image(_) => None,
        }
    }
}

// =============================================================================
// BLOCK
// =============================================================================

/// The unit of content and computation.
///
/// `combined_data` caches the last substitution output so a recompute
/// with unchanged inputs can short-circuit. `last_request` and
/// `generation` are scheduler bookkeeping: they never serialize and are
/// rebuilt from scratch on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    /// Stable identifier, assigned at creation.
    pub id: BlockId,
    /// User-editable label. Uniqueness is NOT enforced; name resolution
    /// always picks the first matching block in id order.
    pub name: String,
    /// What this block computes.
    pub kind: BlockKind,
    /// Raw input text, possibly containing reference tokens.
    pub data: String,
    /// Transform directive text (empty for static blocks).
    pub instructions: String,
    /// Last computed substitution of `data` with references resolved.
    pub combined_data: Option<String>,
    /// Last computed output, if any.
    pub result: Option<TransformResult>,
    /// Whether the most recent transform request for this block failed.
    pub errored: bool,
    /// Which fields the user may edit.
    pub interaction_state: InteractionState,
    /// When the last transform request was dispatched (rate limiting).
    #[serde(skip)]
    pub last_request: Option<Instant>,
    /// Request generation counter; responses from a stale generation
    /// are discarded by the scheduler.
    #[serde(skip)]
    pub generation: u64,
}

impl Block {
    /// Create a fresh block with empty data and no result.
    #[must_use]
    pub fn new(id: BlockId, name: impl Into<String>, kind: BlockKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            data: String::new(),
            instructions: String::new(),
            combined_data: None,
            result: None,
            errored: false,
            interaction_state: InteractionState::Open,
            last_request: None,
            generation: 0,
        }
    }

    /// The result text usable by consumers, if the block has one and is
    /// not in an error state.
    #[must_use]
    pub fn usable_result(&self) -> Option<&str> {
        if self.errored {
            return None;
        }
        self.result.as_ref().and_then(TransformResult::as_text)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// A circular dependency among a requested set of blocks.
///
/// Raised by topological sorting; identifies the member set so the
/// scheduler can report which blocks form the cycle when it aborts the
/// batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circular dependency between blocks {members:?}")]
pub struct CycleError {
    /// The blocks that could not be ordered.
    pub members: Vec<BlockId>,
}

/// Errors that can occur in the Blockflow core.
///
/// - No silent failures
/// - The CORE never panics; all errors are recoverable
#[derive(Debug, Error)]
pub enum BlockflowError {
    /// A recomputation batch contains a circular dependency chain.
    #[error(transparent)]
    Cycle(#[from] CycleError),

    /// The requested block does not exist in the store.
    #[error("Block not found: {0}")]
    BlockNotFound(BlockId),

    /// A document failed validation before loading.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
