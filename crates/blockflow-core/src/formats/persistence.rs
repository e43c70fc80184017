//! # Document Persistence Format
//!
//! Binary serialization for Blockflow documents.
//!
//! A persisted document is the stripped form of each block: name, kind,
//! data, instructions, interaction state. Results, cached combined data,
//! and scheduler bookkeeping are recomputed after load and never stored.
//!
//! Format: Header (5 bytes) + postcard-serialized block list.
//! - 4 bytes: Magic ("BLKF")
//! - 1 byte: Version
//!
//! Pre-deserialization validation guards against corrupted or hostile
//! payloads: size limits are checked BEFORE parsing, and the header is
//! validated before the payload.

use crate::primitives;
use crate::types::{Block, BlockKind, BlockflowError, InteractionState};
use serde::{Deserialize, Serialize};

/// Minimum valid document size (header only).
const MIN_DOCUMENT_SIZE: usize = 5;

// =============================================================================
// STORED BLOCK
// =============================================================================

/// The persisted, stripped form of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBlock {
    pub name: String,
    pub kind: BlockKind,
    pub data: String,
    pub instructions: String,
    #[serde(default)]
    pub interaction_state: InteractionState,
}

impl From<&Block> for StoredBlock {
    fn from(block: &Block) -> Self {
        Self {
            name: block.name.clone(),
            kind: block.kind,
            data: block.data.clone(),
            instructions: block.instructions.clone(),
            interaction_state: block.interaction_state,
        }
    }
}

// =============================================================================
// FILE HEADER
// =============================================================================

/// The document header precedes all block data.
#[derive(Debug, Clone, Copy)]
pub struct DocumentHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl DocumentHeader {
    /// Create a new header with the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Validate the header.
    pub fn validate(&self) -> Result<(), BlockflowError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(BlockflowError::DeserializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(BlockflowError::DeserializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 5] {
        let mut bytes = [0u8; 5];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BlockflowError> {
        if bytes.len() < MIN_DOCUMENT_SIZE {
            return Err(BlockflowError::DeserializationError(
                "Header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for DocumentHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a document to bytes (header + payload).
///
/// This is a pure transformation - no file I/O.
pub fn document_to_bytes(blocks: &[StoredBlock]) -> Result<Vec<u8>, BlockflowError> {
    if blocks.len() > primitives::MAX_DOCUMENT_BLOCKS {
        return Err(BlockflowError::InvalidDocument(format!(
            "Document has {} blocks, maximum is {}",
            blocks.len(),
            primitives::MAX_DOCUMENT_BLOCKS
        )));
    }

    let header = DocumentHeader::new();
    let payload = postcard::to_stdvec(blocks)
        .map_err(|e| BlockflowError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(5 + payload.len());
    result.extend_from_slice(&header.to_bytes());
    result.extend_from_slice(&payload);

    Ok(result)
}

/// Deserialize a document from bytes.
///
/// Validates minimum size, maximum size, and the header, in that order,
/// all before the payload is parsed.
pub fn document_from_bytes(bytes: &[u8]) -> Result<Vec<StoredBlock>, BlockflowError> {
    if bytes.len() < MIN_DOCUMENT_SIZE {
        return Err(BlockflowError::DeserializationError(
            "Data too short: minimum 5 bytes required".to_string(),
        ));
    }

    if bytes.len() > primitives::MAX_DOCUMENT_PAYLOAD_SIZE {
        return Err(BlockflowError::DeserializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            primitives::MAX_DOCUMENT_PAYLOAD_SIZE
        )));
    }

    let header = DocumentHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = &bytes[5..];
    let blocks: Vec<StoredBlock> = postcard::from_bytes(payload).map_err(|e| {
        BlockflowError::DeserializationError(format!("Failed to deserialize document: {}", e))
    })?;

    if blocks.len() > primitives::MAX_DOCUMENT_BLOCKS {
        return Err(BlockflowError::InvalidDocument(format!(
            "Document has {} blocks, maximum is {}",
            blocks.len(),
            primitives::MAX_DOCUMENT_BLOCKS
        )));
    }

    Ok(blocks)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn sample_document() -> Vec<StoredBlock> {
        vec![
            StoredBlock {
                name: "a".to_string(),
                kind: BlockKind::Static,
                data: "hello".to_string(),
                instructions: String::new(),
                interaction_state: InteractionState::Open,
            },
            StoredBlock {
                name: "b".to_string(),
                kind: BlockKind::Text,
                data: "#a world".to_string(),
                instructions: "uppercase".to_string(),
                interaction_state: InteractionState::Locked,
            },
        ]
    }

    #[test]
    fn header_roundtrip() {
        let header = DocumentHeader::new();
        let bytes = header.to_bytes();
        let restored = DocumentHeader::from_bytes(&bytes).expect("parse header");

        assert_eq!(restored.magic, *primitives::MAGIC_BYTES);
        assert_eq!(restored.version, primitives::FORMAT_VERSION);
    }

    #[test]
    fn document_roundtrip() {
        let doc = sample_document();
        let bytes = document_to_bytes(&doc).expect("serialize");
        let restored = document_from_bytes(&bytes).expect("deserialize");
        assert_eq!(restored, doc);
    }

    #[test]
    fn empty_document_roundtrip() {
        let bytes = document_to_bytes(&[]).expect("serialize");
        let restored = document_from_bytes(&bytes).expect("deserialize");
        assert!(restored.is_empty());
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = document_to_bytes(&sample_document()).expect("serialize");
        bytes[0..4].copy_from_slice(b"XXXX");
        assert!(document_from_bytes(&bytes).is_err());
    }

    #[test]
    fn wrong_version_rejected() {
        let mut bytes = document_to_bytes(&sample_document()).expect("serialize");
        bytes[4] = primitives::FORMAT_VERSION + 1;
        assert!(document_from_bytes(&bytes).is_err());
    }

    #[test]
    fn truncated_data_rejected() {
        assert!(document_from_bytes(&[0x42]).is_err());
    }

    #[test]
    fn corrupted_payload_rejected() {
        let header = DocumentHeader::new();
        let mut bytes = header.to_bytes().to_vec();
        bytes.extend_from_slice(&[0xff; 16]);
        assert!(document_from_bytes(&bytes).is_err());
    }
}
