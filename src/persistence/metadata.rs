//! Metadata tracking for index persistence.
//!
//! `metadata.json` is written last when an index is saved, so its presence
//! marks a finished save. It records enough to cross-check the other
//! artifacts on load.

use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingStrategy;
use crate::persistence::{METADATA_FILE, PersistenceError, write_atomic};
use crate::vector::DistanceMetric;

/// Metadata for a persisted index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Version of the on-disk layout
    pub version: u32,

    /// Strategy that produced the vectors
    pub strategy: EmbeddingStrategy,

    /// Distance policy of the index
    pub metric: DistanceMetric,

    /// Vector dimension, 0 for an empty corpus
    pub dimension: usize,

    /// Number of records (and vectors)
    pub record_count: usize,

    /// SHA-256 over record ids and questions
    pub corpus_checksum: String,

    /// Unix timestamp when created
    pub created_at: u64,
}

impl IndexMetadata {
    /// Current metadata version
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(
        strategy: EmbeddingStrategy,
        metric: DistanceMetric,
        dimension: usize,
        record_count: usize,
        corpus_checksum: String,
    ) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            strategy,
            metric,
            dimension,
            record_count,
            corpus_checksum,
            created_at: Utc::now().timestamp().max(0) as u64,
        }
    }

    /// Save metadata to `dir/metadata.json`
    pub fn save(&self, dir: &Path) -> Result<(), PersistenceError> {
        let path = dir.join(METADATA_FILE);
        let json = serde_json::to_string_pretty(self).map_err(|source| PersistenceError::Json {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, json.as_bytes())
    }

    /// Load metadata from `dir/metadata.json`, rejecting newer layouts
    pub fn load(dir: &Path) -> Result<Self, PersistenceError> {
        let path = dir.join(METADATA_FILE);
        let json = std::fs::read_to_string(&path).map_err(|source| PersistenceError::Io {
            path: path.clone(),
            source,
        })?;
        let metadata: Self =
            serde_json::from_str(&json).map_err(|source| PersistenceError::Json { path, source })?;

        // Check version compatibility
        if metadata.version > Self::CURRENT_VERSION {
            return Err(PersistenceError::UnsupportedVersion {
                found: metadata.version,
                supported: Self::CURRENT_VERSION,
            });
        }

        Ok(metadata)
    }
}
