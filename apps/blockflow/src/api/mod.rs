//! # Blockflow HTTP API Module
//!
//! The edit-event boundary: an axum REST API over the update scheduler
//! and the document store. Every recomputation chain starts with an
//! edit event arriving here.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /blocks` - List all blocks
//! - `POST /blocks` - Create a block
//! - `GET /blocks/{id}` - Fetch one block
//! - `DELETE /blocks/{id}` - Delete a block (consumers updated first)
//! - `POST /blocks/{id}/input` - Edit a block's data/instructions
//! - `POST /blocks/{id}/refresh` - Immediate forced recompute
//! - `POST /blocks/{id}/rename` - Rename a block
//! - `POST /blocks/{id}/state` - Change interaction state
//! - `GET /document` - Stripped export of the current blocks
//! - `POST /document/load` - Replace the current blocks
//! - `POST /document/persist` - Save a new version of a named document
//! - `POST /document/restore` - Load a persisted document
//! - `GET /document/versions/{doc}` - List a document's versions
//! - `GET /documents` - List persisted document ids
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `BLOCKFLOW_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `BLOCKFLOW_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)

mod handlers;
mod middleware;
mod types;

// Re-exports for external use
pub use middleware::{create_rate_limiter, get_rate_limit_from_env};
// Re-export handlers and types for integration tests (via `blockflow::api::*`)
#[allow(unused_imports)]
pub use handlers::{
    create_block_handler, delete_block_handler, documents_handler, export_document_handler,
    get_block_handler, health_handler, input_handler, list_blocks_handler, load_document_handler,
    persist_handler, refresh_handler, rename_handler, restore_handler, state_handler,
    versions_handler,
};
#[allow(unused_imports)]
pub use types::{
    BlockJson, BlocksResponse, CreateBlockRequest, DocumentResponse, DocumentsResponse,
    HealthResponse, InputRequest, LoadDocumentRequest, OkResponse, PersistRequest,
    PersistResponse, RenameRequest, RestoreRequest, ResultJson, StateRequest, VersionsResponse,
};

use crate::engine::Scheduler;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use blockflow_core::{BlockflowError, DocumentStore, primitives::MAX_DOCUMENT_PAYLOAD_SIZE};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state: the scheduler handle and the document store.
#[derive(Clone)]
pub struct AppState {
    /// The update scheduler (cloneable handle over shared state).
    pub scheduler: Scheduler,
    /// The versioned document store.
    pub documents: Arc<Mutex<DocumentStore>>,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(scheduler: Scheduler, documents: DocumentStore) -> Self {
        Self {
            scheduler,
            documents: Arc::new(Mutex::new(documents)),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from environment configuration.
///
/// Reads `BLOCKFLOW_CORS_ORIGINS` environment variable:
/// - If "*": allows all origins (development mode - use with caution!)
/// - If not set: defaults to localhost only (restrictive default)
/// - Otherwise: parses comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("BLOCKFLOW_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (BLOCKFLOW_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in BLOCKFLOW_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE])
            }
        }
        None => {
            tracing::info!("CORS: No BLOCKFLOW_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let localhost_origins = vec![
        "http://localhost:3000".parse::<HeaderValue>().ok(),
        "http://localhost:8080".parse::<HeaderValue>().ok(),
        "http://127.0.0.1:3000".parse::<HeaderValue>().ok(),
        "http://127.0.0.1:8080".parse::<HeaderValue>().ok(),
    ];
    let origins: Vec<HeaderValue> = localhost_origins.into_iter().flatten().collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. CORS - handles preflight requests
/// 2. Tracing - logs all requests
/// 3. Body limit - caps request payloads at the document size limit
/// 4. Rate Limiting - protects against request floods (if enabled)
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();

    let rate_limit = get_rate_limit_from_env();
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route(
            "/blocks",
            get(handlers::list_blocks_handler).post(handlers::create_block_handler),
        )
        .route(
            "/blocks/{id}",
            get(handlers::get_block_handler).delete(handlers::delete_block_handler),
        )
        .route("/blocks/{id}/input", post(handlers::input_handler))
        .route("/blocks/{id}/refresh", post(handlers::refresh_handler))
        .route("/blocks/{id}/rename", post(handlers::rename_handler))
        .route("/blocks/{id}/state", post(handlers::state_handler))
        .route("/document", get(handlers::export_document_handler))
        .route("/document/load", post(handlers::load_document_handler))
        .route("/document/persist", post(handlers::persist_handler))
        .route("/document/restore", post(handlers::restore_handler))
        .route(
            "/document/versions/{doc}",
            get(handlers::versions_handler),
        )
        .route("/documents", get(handlers::documents_handler));

    // Apply rate limiting middleware
    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    // Apply CORS, body limit, and tracing (outermost layers)
    router
        .layer(axum::extract::DefaultBodyLimit::max(
            MAX_DOCUMENT_PAYLOAD_SIZE,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), BlockflowError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| BlockflowError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Blockflow HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| BlockflowError::IoError(format!("Server error: {}", e)))
}
