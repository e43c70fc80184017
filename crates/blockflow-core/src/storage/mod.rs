//! # Storage Backends
//!
//! Disk-backed persistence for Blockflow documents.

pub mod document_store;

pub use document_store::DocumentStore;
