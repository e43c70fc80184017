//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.

use super::{
    AppState,
    types::{
        BlockJson, BlocksResponse, CreateBlockRequest, DocumentResponse, DocumentsResponse,
        HealthResponse, InputRequest, LoadDocumentRequest, OkResponse, PersistRequest,
        PersistResponse, RenameRequest, RestoreRequest, StateRequest, VersionsResponse,
    },
};
use crate::engine::BlockInput;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use blockflow_core::{BlockId, BlockflowError};

/// Map an engine error to a status code for the mutation endpoints.
fn error_status(e: &BlockflowError) -> StatusCode {
    match e {
        BlockflowError::BlockNotFound(_) => StatusCode::NOT_FOUND,
        BlockflowError::Cycle(_) => StatusCode::CONFLICT,
        BlockflowError::InvalidDocument(_)
        | BlockflowError::SerializationError(_)
        | BlockflowError::DeserializationError(_) => StatusCode::BAD_REQUEST,
        BlockflowError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// BLOCK HANDLERS
// =============================================================================

/// List all blocks in creation order.
pub async fn list_blocks_handler(State(state): State<AppState>) -> impl IntoResponse {
    let blocks = state.scheduler.block_snapshots().await;
    let response = BlocksResponse {
        blocks: blocks.iter().map(BlockJson::from).collect(),
    };
    (StatusCode::OK, Json(response))
}

/// Create a new block.
pub async fn create_block_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateBlockRequest>,
) -> impl IntoResponse {
    if let Err(e) = request.validate() {
        return (StatusCode::BAD_REQUEST, Json(OkResponse::error(e.to_string()))).into_response();
    }

    let block = state.scheduler.create_block(request.kind, request.name).await;
    (StatusCode::CREATED, Json(BlockJson::from(&block))).into_response()
}

/// Fetch one block.
pub async fn get_block_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    match state.scheduler.get_block(BlockId(id)).await {
        Some(block) => (StatusCode::OK, Json(BlockJson::from(&block))).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(OkResponse::error(format!("Block not found: {id}"))),
        )
            .into_response(),
    }
}

/// Delete a block. Its consumers are updated before the node leaves
/// the graph.
pub async fn delete_block_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    match state.scheduler.delete_block(BlockId(id)).await {
        Ok(()) => (StatusCode::OK, Json(OkResponse::success())),
        Err(e) => (error_status(&e), Json(OkResponse::error(e.to_string()))),
    }
}

/// Apply an edit to a block's input fields. This is the edit-event
/// boundary: every recomputation chain starts here.
pub async fn input_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<InputRequest>,
) -> impl IntoResponse {
    if let Err(e) = request.validate() {
        return (StatusCode::BAD_REQUEST, Json(OkResponse::error(e.to_string())));
    }

    let input = BlockInput {
        data: request.data,
        instructions: request.instructions,
    };

    match state
        .scheduler
        .handle_input_change(BlockId(id), Some(input), request.immediate, false)
        .await
    {
        Ok(()) => (StatusCode::OK, Json(OkResponse::success())),
        Err(e) => (error_status(&e), Json(OkResponse::error(e.to_string()))),
    }
}

/// Force an immediate recompute of a block from its stored data.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> impl IntoResponse {
    match state
        .scheduler
        .handle_input_change(BlockId(id), None, true, true)
        .await
    {
        Ok(()) => (StatusCode::OK, Json(OkResponse::success())),
        Err(e) => (error_status(&e), Json(OkResponse::error(e.to_string()))),
    }
}

/// Rename a block.
pub async fn rename_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<RenameRequest>,
) -> impl IntoResponse {
    if let Err(e) = request.validate() {
        return (StatusCode::BAD_REQUEST, Json(OkResponse::error(e.to_string())));
    }

    match state.scheduler.rename_block(BlockId(id), request.name).await {
        Ok(()) => (StatusCode::OK, Json(OkResponse::success())),
        Err(e) => (error_status(&e), Json(OkResponse::error(e.to_string()))),
    }
}

/// Change a block's interaction state.
pub async fn state_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<StateRequest>,
) -> impl IntoResponse {
    match state
        .scheduler
        .set_interaction_state(BlockId(id), request.interaction_state)
        .await
    {
        Ok(()) => (StatusCode::OK, Json(OkResponse::success())),
        Err(e) => (error_status(&e), Json(OkResponse::error(e.to_string()))),
    }
}

// =============================================================================
// DOCUMENT HANDLERS
// =============================================================================

/// Stripped export of the current blocks.
pub async fn export_document_handler(State(state): State<AppState>) -> impl IntoResponse {
    let blocks = state.scheduler.export_document().await;
    (StatusCode::OK, Json(DocumentResponse { blocks }))
}

/// Replace the current blocks with the given document and recompute
/// everything. A reference cycle in the document is a conflict.
pub async fn load_document_handler(
    State(state): State<AppState>,
    Json(request): Json<LoadDocumentRequest>,
) -> impl IntoResponse {
    match state.scheduler.load_document(&request.blocks).await {
        Ok(ids) => {
            tracing::info!(blocks = ids.len(), "document loaded via API");
            (StatusCode::OK, Json(OkResponse::success()))
        }
        Err(e) => (error_status(&e), Json(OkResponse::error(e.to_string()))),
    }
}

/// Persist the current blocks as a new version of a named document.
pub async fn persist_handler(
    State(state): State<AppState>,
    Json(request): Json<PersistRequest>,
) -> impl IntoResponse {
    let blocks = state.scheduler.export_document().await;
    let mut documents = state.documents.lock().await;
    match documents.save(&request.document, &blocks) {
        Ok(version) => (
            StatusCode::OK,
            Json(PersistResponse {
                document: request.document,
                version,
            }),
        )
            .into_response(),
        Err(e) => (error_status(&e), Json(OkResponse::error(e.to_string()))).into_response(),
    }
}

/// Restore a persisted document into the scheduler.
pub async fn restore_handler(
    State(state): State<AppState>,
    Json(request): Json<RestoreRequest>,
) -> impl IntoResponse {
    let loaded = {
        let documents = state.documents.lock().await;
        match request.version {
            Some(version) => documents.load_version(&request.document, version),
            None => documents.load_latest(&request.document),
        }
    };

    match loaded {
        Ok(Some(blocks)) => match state.scheduler.load_document(&blocks).await {
            Ok(_) => (StatusCode::OK, Json(DocumentResponse { blocks })).into_response(),
            Err(e) => (error_status(&e), Json(OkResponse::error(e.to_string()))).into_response(),
        },
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(OkResponse::error(format!(
                "Document not found: {}",
                request.document
            ))),
        )
            .into_response(),
        Err(e) => (error_status(&e), Json(OkResponse::error(e.to_string()))).into_response(),
    }
}

/// List the stored versions of one document.
pub async fn versions_handler(
    State(state): State<AppState>,
    Path(document): Path<String>,
) -> impl IntoResponse {
    let documents = state.documents.lock().await;
    match documents.list_versions(&document) {
        Ok(versions) => (
            StatusCode::OK,
            Json(VersionsResponse { document, versions }),
        )
            .into_response(),
        Err(e) => (error_status(&e), Json(OkResponse::error(e.to_string()))).into_response(),
    }
}

/// List every persisted document id.
pub async fn documents_handler(State(state): State<AppState>) -> impl IntoResponse {
    let documents = state.documents.lock().await;
    match documents.list_documents() {
        Ok(ids) => (StatusCode::OK, Json(DocumentsResponse { documents: ids })).into_response(),
        Err(e) => (error_status(&e), Json(OkResponse::error(e.to_string()))).into_response(),
    }
}
