//! # Application Configuration
//!
//! TOML configuration (`blockflow.toml`) for the server, scheduler and
//! storage. Every field has a default so a missing file or an empty
//! file yields a working configuration.
//!
//! ```toml
//! [service]
//! text_url = "http://127.0.0.1:9090/text"
//! image_url = "http://127.0.0.1:9090/image"
//! quality_enabled = false
//!
//! [scheduler]
//! debounce_ms = 5000
//!
//! [storage]
//! database = "blockflow.db"
//! ```

use blockflow_core::{BlockflowError, primitives::DEBOUNCE_WINDOW_MS};
use serde::Deserialize;
use std::path::{Path, PathBuf};

// =============================================================================
// CONFIGURATION STRUCTURES
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transform service endpoints.
    pub service: ServiceConfig,
    /// Update scheduler tuning.
    pub scheduler: SchedulerConfig,
    /// Document persistence.
    pub storage: StorageConfig,
}

/// Transform service endpoints and options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Text transform service URL.
    pub text_url: String,
    /// Image transform service URL.
    pub image_url: String,
    /// Forwarded to the transform services as `qualityEnabled`.
    pub quality_enabled: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            text_url: "http://127.0.0.1:9090/text".to_string(),
            image_url: "http://127.0.0.1:9090/image".to_string(),
            quality_enabled: false,
        }
    }
}

/// Update scheduler tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Minimum interval between two dispatched transform requests for
    /// the same block, in milliseconds.
    pub debounce_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEBOUNCE_WINDOW_MS,
        }
    }
}

/// Document persistence settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the redb document database.
    pub database: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("blockflow.db"),
        }
    }
}

// =============================================================================
// LOADING
// =============================================================================

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// With `path = None`, reads `blockflow.toml` from the working
    /// directory if present, otherwise returns the defaults. An
    /// explicitly named file must exist and parse.
    pub fn load(path: Option<&Path>) -> Result<Self, BlockflowError> {
        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(BlockflowError::IoError(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                Self::read(path)
            }
            None => Self::load_optional(Path::new("blockflow.toml")),
        }
    }

    /// Load `path` if it exists, otherwise fall back to the defaults.
    fn load_optional(path: &Path) -> Result<Self, BlockflowError> {
        if path.exists() {
            Self::read(path)
        } else {
            Ok(Self::default())
        }
    }

    fn read(path: &Path) -> Result<Self, BlockflowError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BlockflowError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;

        toml::from_str(&raw).map_err(|e| {
            BlockflowError::DeserializationError(format!(
                "Invalid config '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.scheduler.debounce_ms, DEBOUNCE_WINDOW_MS);
        assert_eq!(config.storage.database, PathBuf::from("blockflow.db"));
        assert!(!config.service.quality_enabled);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: Config = toml::from_str("[scheduler]\ndebounce_ms = 250\n").expect("parse");
        assert_eq!(config.scheduler.debounce_ms, 250);
        assert_eq!(
            config.service.text_url,
            ServiceConfig::default().text_url
        );
    }

    #[test]
    fn missing_optional_file_is_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::load_optional(&dir.path().join("blockflow.toml")).expect("load");
        assert_eq!(config.scheduler.debounce_ms, DEBOUNCE_WINDOW_MS);
    }

    #[test]
    fn optional_file_is_read_when_present() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("blockflow.toml");
        std::fs::write(&path, "[scheduler]\ndebounce_ms = 42\n").expect("write");

        let config = Config::load_optional(&path).expect("load");
        assert_eq!(config.scheduler.debounce_ms, 42);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let result = Config::load(Some(Path::new("/nonexistent/blockflow.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn full_file_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("blockflow.toml");
        std::fs::write(
            &path,
            "[service]\ntext_url = \"http://svc/t\"\nimage_url = \"http://svc/i\"\nquality_enabled = true\n\n[storage]\ndatabase = \"/tmp/docs.db\"\n",
        )
        .expect("write");

        let config = Config::load(Some(&path)).expect("load");
        assert_eq!(config.service.text_url, "http://svc/t");
        assert!(config.service.quality_enabled);
        assert_eq!(config.storage.database, PathBuf::from("/tmp/docs.db"));
    }
}
