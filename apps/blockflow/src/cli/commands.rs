//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api::{self, AppState};
use crate::config::Config;
use crate::engine::{Scheduler, TransformClient, plan_update, rebuild_graph};
use blockflow_core::{
    BlockStore, BlockflowError, DocumentStore, document_from_bytes,
    primitives::MAX_DOCUMENT_PAYLOAD_SIZE,
};
use std::path::Path;
use std::time::Duration;

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    config_path: Option<&Path>,
    host: &str,
    port: u16,
) -> Result<(), BlockflowError> {
    let config = Config::load(config_path)?;

    let transforms = TransformClient::new(&config.service);
    let scheduler = Scheduler::new(
        transforms,
        Duration::from_millis(config.scheduler.debounce_ms),
    );
    let documents = DocumentStore::open(&config.storage.database)?;

    tracing::info!(
        text_url = %config.service.text_url,
        image_url = %config.service.image_url,
        debounce_ms = config.scheduler.debounce_ms,
        database = %config.storage.database.display(),
        "starting server"
    );

    let addr = format!("{host}:{port}");
    api::run_server(&addr, AppState::new(scheduler, documents)).await
}

// =============================================================================
// PLAN COMMAND
// =============================================================================

/// Load a document file and print how a full recompute of it would be
/// executed: the independent set and the topological order, or the
/// detected cycle.
pub fn cmd_plan(file: &Path, json_mode: bool) -> Result<(), BlockflowError> {
    let metadata = std::fs::metadata(file)
        .map_err(|e| BlockflowError::IoError(format!("Cannot read '{}': {}", file.display(), e)))?;
    if metadata.len() > MAX_DOCUMENT_PAYLOAD_SIZE as u64 {
        return Err(BlockflowError::InvalidDocument(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_DOCUMENT_PAYLOAD_SIZE
        )));
    }

    let bytes = std::fs::read(file)
        .map_err(|e| BlockflowError::IoError(format!("Cannot read '{}': {}", file.display(), e)))?;
    let stored = document_from_bytes(&bytes)?;

    let mut store = BlockStore::new();
    let ids = store.load_document(&stored);
    let graph = rebuild_graph(&store);

    let name_of = |id| {
        store
            .get(id)
            .map_or_else(|| "?".to_string(), |b| b.name.clone())
    };

    match plan_update(&graph, &ids) {
        Ok(plan) => {
            if json_mode {
                let json = serde_json::json!({
                    "independent": plan.independent.iter().map(|&id| name_of(id)).collect::<Vec<_>>(),
                    "dependent": plan.dependent.iter().map(|&id| name_of(id)).collect::<Vec<_>>(),
                });
                println!("{json}");
            } else {
                println!("Blocks: {}", store.len());
                println!("Independent (dispatched concurrently):");
                for id in &plan.independent {
                    println!("  {} ({})", name_of(*id), id);
                }
                println!("Dependent (awaited in this order):");
                for id in &plan.dependent {
                    println!("  {} ({})", name_of(*id), id);
                }
            }
            Ok(())
        }
        Err(cycle) => {
            if json_mode {
                let json = serde_json::json!({
                    "cycle": cycle.members.iter().map(|&id| name_of(id)).collect::<Vec<_>>(),
                });
                println!("{json}");
            } else {
                println!("Circular dependency between:");
                for id in &cycle.members {
                    println!("  {} ({})", name_of(*id), id);
                }
            }
            Err(cycle.into())
        }
    }
}

// =============================================================================
// STORAGE COMMANDS
// =============================================================================

/// List persisted versions of a document.
pub fn cmd_versions(
    config_path: Option<&Path>,
    document: &str,
    json_mode: bool,
) -> Result<(), BlockflowError> {
    let config = Config::load(config_path)?;
    let store = DocumentStore::open(&config.storage.database)?;
    let versions = store.list_versions(document)?;

    if json_mode {
        let json = serde_json::json!({ "document": document, "versions": versions });
        println!("{json}");
    } else if versions.is_empty() {
        println!("No versions stored for '{document}'");
    } else {
        println!("Versions of '{document}':");
        for v in versions {
            println!("  {v}");
        }
    }
    Ok(())
}

/// List persisted document ids.
pub fn cmd_documents(config_path: Option<&Path>, json_mode: bool) -> Result<(), BlockflowError> {
    let config = Config::load(config_path)?;
    let store = DocumentStore::open(&config.storage.database)?;
    let documents = store.list_documents()?;

    if json_mode {
        let json = serde_json::json!({ "documents": documents });
        println!("{json}");
    } else if documents.is_empty() {
        println!("No documents stored");
    } else {
        for d in documents {
            println!("{d}");
        }
    }
    Ok(())
}
