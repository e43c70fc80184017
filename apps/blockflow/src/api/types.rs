//! # API Request/Response Types
//!
//! JSON structures for the HTTP API. Image results are base64-encoded
//! in responses; everything else is plain JSON.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use blockflow_core::{
    Block, BlockKind, BlockflowError, InteractionState, StoredBlock, TransformResult,
    primitives::{MAX_NAME_LENGTH, MAX_TEXT_LENGTH},
};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// BLOCK VIEW
// =============================================================================

/// A block's computed result, as serialized to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ResultJson {
    /// Transformed (or static) text.
    Text(String),
    /// Base64-encoded image payload.
    Image(String),
}

impl From<&TransformResult> for ResultJson {
    fn from(result: &TransformResult) -> Self {
        match result {
            TransformResult::Text(s) => Self::Text(s.clone()),
            TransformResult::Image(bytes) => Self::Image(BASE64.encode(bytes)),
        }
    }
}

/// Snapshot of one block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockJson {
    pub id: u64,
    pub name: String,
    pub kind: BlockKind,
    pub data: String,
    pub instructions: String,
    pub combined_data: Option<String>,
    pub result: Option<ResultJson>,
    pub errored: bool,
    pub interaction_state: InteractionState,
}

impl From<&Block> for BlockJson {
    fn from(block: &Block) -> Self {
        Self {
            id: block.id.0,
            name: block.name.clone(),
            kind: block.kind,
            data: block.data.clone(),
            instructions: block.instructions.clone(),
            combined_data: block.combined_data.clone(),
            result: block.result.as_ref().map(ResultJson::from),
            errored: block.errored,
            interaction_state: block.interaction_state,
        }
    }
}

/// List of block snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlocksResponse {
    pub blocks: Vec<BlockJson>,
}

// =============================================================================
// BLOCK REQUESTS
// =============================================================================

/// Create a new block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBlockRequest {
    pub kind: BlockKind,
    #[serde(default)]
    pub name: Option<String>,
}

impl CreateBlockRequest {
    /// Validate the optional name at the API boundary.
    pub fn validate(&self) -> Result<(), BlockflowError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        Ok(())
    }
}

/// An edit to a block's input fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputRequest {
    pub data: String,
    #[serde(default)]
    pub instructions: String,
    /// Skip the debounce window for this edit.
    #[serde(default)]
    pub immediate: bool,
}

impl InputRequest {
    /// Validate field lengths at the API boundary, before the data
    /// reaches the scheduler.
    pub fn validate(&self) -> Result<(), BlockflowError> {
        if self.data.len() > MAX_TEXT_LENGTH {
            return Err(BlockflowError::SerializationError(format!(
                "Data length {} exceeds maximum {} bytes",
                self.data.len(),
                MAX_TEXT_LENGTH
            )));
        }
        if self.instructions.len() > MAX_TEXT_LENGTH {
            return Err(BlockflowError::SerializationError(format!(
                "Instructions length {} exceeds maximum {} bytes",
                self.instructions.len(),
                MAX_TEXT_LENGTH
            )));
        }
        Ok(())
    }
}

/// Rename a block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

impl RenameRequest {
    pub fn validate(&self) -> Result<(), BlockflowError> {
        validate_name(&self.name)
    }
}

/// Change a block's interaction state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateRequest {
    pub interaction_state: InteractionState,
}

fn validate_name(name: &str) -> Result<(), BlockflowError> {
    if name.is_empty() {
        return Err(BlockflowError::SerializationError(
            "Name must not be empty".to_string(),
        ));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(BlockflowError::SerializationError(format!(
            "Name length {} exceeds maximum {} bytes",
            name.len(),
            MAX_NAME_LENGTH
        )));
    }
    Ok(())
}

// =============================================================================
// DOCUMENT REQUESTS/RESPONSES
// =============================================================================

/// Replace the current blocks with a stored document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadDocumentRequest {
    pub blocks: Vec<StoredBlock>,
}

/// Stripped export of the current blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentResponse {
    pub blocks: Vec<StoredBlock>,
}

/// Persist the current blocks as a new version of a named document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistRequest {
    pub document: String,
}

/// Restore a persisted document (latest version unless given).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreRequest {
    pub document: String,
    #[serde(default)]
    pub version: Option<u64>,
}

/// Outcome of a persist call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistResponse {
    pub document: String,
    pub version: u64,
}

/// Stored versions of one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionsResponse {
    pub document: String,
    pub versions: Vec<u64>,
}

/// All persisted document ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentsResponse {
    pub documents: Vec<String>,
}

// =============================================================================
// GENERIC OUTCOME
// =============================================================================

/// Generic success/error envelope for mutation endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub success: bool,
    pub error: Option<String>,
}

impl OkResponse {
    #[must_use]
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use blockflow_core::BlockId;

    #[test]
    fn image_result_is_base64_encoded() {
        let mut block = Block::new(BlockId(1), "pic", BlockKind::Image);
        block.result = Some(TransformResult::Image(vec![1, 2, 3]));

        let json = BlockJson::from(&block);
        match json.result {
            Some(ResultJson::Image(b64)) => assert_eq!(b64, BASE64.encode([1, 2, 3])),
            other => panic!("expected image result, got {other:?}"),
        }
    }

    #[test]
    fn oversized_data_is_rejected() {
        let request = InputRequest {
            data: "x".repeat(MAX_TEXT_LENGTH + 1),
            instructions: String::new(),
            immediate: false,
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn empty_rename_is_rejected() {
        let request = RenameRequest {
            name: String::new(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn valid_input_passes() {
        let request = InputRequest {
            data: "hello #A".to_string(),
            instructions: "uppercase".to_string(),
            immediate: true,
        };
        assert!(request.validate().is_ok());
    }
}
