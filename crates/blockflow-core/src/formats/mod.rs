//! # Document Formats
//!
//! Binary serialization for Blockflow documents.

pub mod persistence;

pub use persistence::{DocumentHeader, StoredBlock, document_from_bytes, document_to_bytes};
