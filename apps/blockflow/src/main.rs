//! # Blockflow - Reactive Block Composition Server
//!
//! The main binary for the Blockflow block composition engine.
//!
//! This application provides:
//! - HTTP REST API server (axum-based), the edit-event boundary
//! - Update scheduler driving transform recomputation
//! - CLI interface for server startup and document inspection
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                    apps/blockflow (THE BINARY)                 │
//! │                                                                │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐   │
//! │  │   CLI       │    │   HTTP API  │    │ Update Scheduler │   │
//! │  │  (clap)     │    │   (axum)    │    │ (tokio tasks)    │   │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘   │
//! │         │                  │                    │             │
//! │         └──────────────────┼────────────────────┘             │
//! │                            ▼                                  │
//! │                   ┌────────────────┐                          │
//! │                   │ blockflow-core │                          │
//! │                   │  (THE LOGIC)   │                          │
//! │                   └────────────────┘                          │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! blockflow server --host 0.0.0.0 --port 8080
//!
//! # Inspect a saved document's update plan
//! blockflow plan -f composition.blk
//!
//! # List persisted versions of a document
//! blockflow versions -d my-composition
//! ```

use blockflow::cli;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // Initialize tracing - BLOCKFLOW_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("BLOCKFLOW_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "blockflow=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Display startup banner
    if !cli.quiet {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Blockflow startup banner.
fn print_banner() {
    println!(
        r#"
  ██████╗ ██╗      ██████╗  ██████╗██╗  ██╗███████╗██╗      ██████╗ ██╗    ██╗
  ██╔══██╗██║     ██╔═══██╗██╔════╝██║ ██╔╝██╔════╝██║     ██╔═══██╗██║    ██║
  ██████╔╝██║     ██║   ██║██║     █████╔╝ █████╗  ██║     ██║   ██║██║ █╗ ██║
  ██╔══██╗██║     ██║   ██║██║     ██╔═██╗ ██╔══╝  ██║     ██║   ██║██║███╗██║
  ██████╔╝███████╗╚██████╔╝╚██████╗██║  ██╗██║     ███████╗╚██████╔╝╚███╔███╔╝
  ╚═════╝ ╚══════╝ ╚═════╝  ╚═════╝╚═╝  ╚═╝╚═╝     ╚══════╝ ╚═════╝  ╚══╝╚══╝

  Reactive Block Composition v{}

  Referenced • Ordered • Debounced
"#,
        env!("CARGO_PKG_VERSION")
    );
}
