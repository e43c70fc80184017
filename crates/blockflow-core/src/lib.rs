//! # blockflow-core
//!
//! The deterministic block composition engine for Blockflow - THE LOGIC.
//!
//! A Blockflow document is a set of named content blocks whose data may
//! reference other blocks' computed results by name. This crate owns
//! everything about that model that can be computed without touching the
//! network:
//!
//! - the authoritative [`store::BlockStore`]
//! - reference extraction from free text ([`reference`])
//! - the reverse dependency graph with cycle-detecting topological
//!   ordering ([`graph`])
//! - substitution of referenced results into consuming blocks
//!   ([`substitute`])
//! - the binary document format ([`formats`]) and the versioned
//!   document store ([`storage`])
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Is the ONLY place where block state lives (stateful)
//! - Is deterministic: `BTreeMap`/`BTreeSet` only, no randomness
//! - Has NO async, NO network dependencies (pure Rust)
//!
//! Driving recomputation through the Transform Services - debouncing,
//! topological batch scheduling, write-back of results - is the app
//! layer's job; the CORE only answers "who references whom" and "what
//! does this block's combined data look like right now".

// =============================================================================
// MODULES
// =============================================================================

pub mod formats;
pub mod graph;
pub mod primitives;
pub mod reference;
pub mod storage;
pub mod store;
pub mod substitute;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Block, BlockId, BlockKind, BlockflowError, CycleError, InteractionState, TransformResult,
};

// =============================================================================
// RE-EXPORTS: Engine Components
// =============================================================================

pub use graph::DependencyGraph;
pub use reference::extract_references;
pub use store::BlockStore;
pub use substitute::{Substitution, resolve_references};

// =============================================================================
// RE-EXPORTS: Formats & Storage
// =============================================================================

pub use formats::{DocumentHeader, StoredBlock, document_from_bytes, document_to_bytes};
pub use storage::DocumentStore;
