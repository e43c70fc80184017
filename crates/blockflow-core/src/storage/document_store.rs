//! # redb-backed Document Store
//!
//! The Persistence Service: versioned, disk-backed storage of stripped
//! documents using the redb embedded database.
//!
//! Every save appends a new version; nothing is overwritten, so any
//! previous version of a document can be loaded back. The scheduler
//! never calls this module - the app layer persists after a
//! recomputation batch.

use crate::formats::{StoredBlock, document_from_bytes, document_to_bytes};
use crate::types::BlockflowError;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::collections::BTreeSet;
use std::path::Path;

/// Table for document versions: (document id, version) -> format bytes.
const VERSIONS: TableDefinition<(&str, u64), &[u8]> = TableDefinition::new("versions");

/// A disk-backed, versioned document store.
pub struct DocumentStore {
    /// The redb database handle.
    db: Database,
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore").finish_non_exhaustive()
    }
}

impl DocumentStore {
    /// Open or create a document database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BlockflowError> {
        let db =
            Database::create(path.as_ref()).map_err(|e| BlockflowError::IoError(e.to_string()))?;

        // Initialize the table if it doesn't exist.
        {
            let write_txn = db
                .begin_write()
                .map_err(|e| BlockflowError::IoError(e.to_string()))?;
            let _ = write_txn
                .open_table(VERSIONS)
                .map_err(|e| BlockflowError::IoError(e.to_string()))?;
            write_txn
                .commit()
                .map_err(|e| BlockflowError::IoError(e.to_string()))?;
        }

        Ok(Self { db })
    }

    /// Persist a document as a new version. Returns the version number.
    ///
    /// Versions start at 1 and only grow; saving never overwrites.
    pub fn save(&mut self, document: &str, blocks: &[StoredBlock]) -> Result<u64, BlockflowError> {
        let bytes = document_to_bytes(blocks)?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| BlockflowError::IoError(e.to_string()))?;

        let version = {
            let mut table = write_txn
                .open_table(VERSIONS)
                .map_err(|e| BlockflowError::IoError(e.to_string()))?;

            let last = table
                .range((document, 0)..=(document, u64::MAX))
                .map_err(|e| BlockflowError::IoError(e.to_string()))?
                .last()
                .transpose()
                .map_err(|e| BlockflowError::IoError(e.to_string()))?
                .map(|(key, _)| key.value().1)
                .unwrap_or(0);

            let version = last.saturating_add(1);
            table
                .insert((document, version), bytes.as_slice())
                .map_err(|e| BlockflowError::IoError(e.to_string()))?;
            version
        };

        write_txn
            .commit()
            .map_err(|e| BlockflowError::IoError(e.to_string()))?;

        Ok(version)
    }

    /// Load the latest version of a document, if any.
    pub fn load_latest(&self, document: &str) -> Result<Option<Vec<StoredBlock>>, BlockflowError> {
        let versions = self.list_versions(document)?;
        match versions.last() {
            Some(&v) => self.load_version(document, v),
            None => Ok(None),
        }
    }

    /// Load a specific version of a document.
    pub fn load_version(
        &self,
        document: &str,
        version: u64,
    ) -> Result<Option<Vec<StoredBlock>>, BlockflowError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| BlockflowError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(VERSIONS)
            .map_err(|e| BlockflowError::IoError(e.to_string()))?;

        let Some(guard) = table
            .get((document, version))
            .map_err(|e| BlockflowError::IoError(e.to_string()))?
        else {
            return Ok(None);
        };

        document_from_bytes(guard.value()).map(Some)
    }

    /// All stored version numbers of a document, ascending.
    pub fn list_versions(&self, document: &str) -> Result<Vec<u64>, BlockflowError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| BlockflowError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(VERSIONS)
            .map_err(|e| BlockflowError::IoError(e.to_string()))?;

        let mut versions = Vec::new();
        for entry in table
            .range((document, 0)..=(document, u64::MAX))
            .map_err(|e| BlockflowError::IoError(e.to_string()))?
        {
            let (key, _) = entry.map_err(|e| BlockflowError::IoError(e.to_string()))?;
            versions.push(key.value().1);
        }
        Ok(versions)
    }

    /// All document ids with at least one stored version.
    pub fn list_documents(&self) -> Result<Vec<String>, BlockflowError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| BlockflowError::IoError(e.to_string()))?;
        let table = read_txn
            .open_table(VERSIONS)
            .map_err(|e| BlockflowError::IoError(e.to_string()))?;

        let mut documents = BTreeSet::new();
        for entry in table
            .iter()
            .map_err(|e| BlockflowError::IoError(e.to_string()))?
        {
            let (key, _) = entry.map_err(|e| BlockflowError::IoError(e.to_string()))?;
            documents.insert(key.value().0.to_string());
        }
        Ok(documents.into_iter().collect())
    }
}

// =============================================================================
// TESTS
// =============================================================================
