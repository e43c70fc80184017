//! # Blockflow CLI Module
//!
//! This module implements the CLI interface for Blockflow.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `plan` - Show the update plan of a saved document file
//! - `versions` - List persisted versions of a document
//! - `documents` - List persisted document ids

mod commands;

use blockflow_core::BlockflowError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Blockflow - Reactive Block Composition Server
///
/// Named content blocks that reference each other's computed results;
/// editing one transparently recomputes everything that depends on it,
/// in dependency order.
#[derive(Parser, Debug)]
#[command(name = "blockflow")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the configuration file (default: ./blockflow.toml if present)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Show the update plan (independent set + topological order) of a
    /// saved document file
    Plan {
        /// Path to the document file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// List persisted versions of a document
    Versions {
        /// Document id
        #[arg(short, long)]
        document: String,
    },

    /// List persisted document ids
    Documents,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), BlockflowError> {
    let config_path = cli.config.as_deref();
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(config_path, &host, port).await,
        Some(Commands::Plan { file }) => cmd_plan(&file, json_mode),
        Some(Commands::Versions { document }) => cmd_versions(config_path, &document, json_mode),
        Some(Commands::Documents) => cmd_documents(config_path, json_mode),
        None => {
            // No subcommand - start the server with defaults
            cmd_server(config_path, "127.0.0.1", 8080).await
        }
    }
}
