//! Save and load of a complete index directory.
//!
//! A persisted index is four files in one directory:
//!
//! | File | Content |
//! | --- | --- |
//! | `vectors.vec` | index rows, see [`MmapVectorStorage`] |
//! | `strategy.json` | fitted [`StrategyState`] |
//! | `records.json` | position → record map |
//! | `metadata.json` | [`IndexMetadata`], written last |
//!
//! A directory holding some but not all of them, or files that disagree on
//! the record count, is reported as [`PersistenceError::IncompleteState`].

mod metadata;

pub use metadata::IndexMetadata;

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::store::{RecordStore, StoreError};
use crate::types::Record;
use crate::vector::{FlatIndex, MmapVectorStorage, StrategyState, VectorError};

pub const VECTORS_FILE: &str = "vectors.vec";
pub const STRATEGY_FILE: &str = "strategy.json";
pub const RECORDS_FILE: &str = "records.json";
pub const METADATA_FILE: &str = "metadata.json";

/// Every artifact of a complete save.
pub const ARTIFACTS: [&str; 4] = [VECTORS_FILE, STRATEGY_FILE, RECORDS_FILE, METADATA_FILE];

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("No persisted index at {}\nSuggestion: Run 'wenda build --corpus <file>' first", .path.display())]
    NotFound { path: PathBuf },

    #[error(
        "Incomplete persisted index at {}: {detail}\nSuggestion: Rebuild the index with 'wenda build --force'",
        .path.display()
    )]
    IncompleteState { path: PathBuf, detail: String },

    #[error(
        "Index format version {found} is newer than supported version {supported}\nSuggestion: Upgrade wenda or rebuild the index"
    )]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error(
        "Persisted {what} does not match: expected {expected}, found {found}\nSuggestion: Rebuild the index"
    )]
    Mismatch {
        what: &'static str,
        expected: String,
        found: String,
    },

    #[error("Failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to (de)serialize {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Vector file error: {0}")]
    Vector(#[from] VectorError),

    #[error("Record store error: {0}")]
    Store(#[from] StoreError),
}

/// Which artifacts exist in an index directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactStatus {
    Complete,
    Missing,
    Incomplete {
        present: Vec<&'static str>,
        missing: Vec<&'static str>,
    },
}

/// Everything needed to restore a ready engine.
#[derive(Debug)]
pub struct PersistedIndex {
    pub state: StrategyState,
    pub index: FlatIndex,
    pub records: RecordStore,
    pub metadata: IndexMetadata,
}

/// Writes bytes to a temp file beside `path` and renames it into place.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    let io_err = |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    let mut file = std::fs::File::create(&temp).map_err(io_err)?;
    file.write_all(bytes).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    std::fs::rename(&temp, path).map_err(io_err)
}

/// Index directory handle.
#[derive(Debug, Clone)]
pub struct IndexPersistence {
    base_path: PathBuf,
}

impl IndexPersistence {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.base_path
    }

    /// Which artifacts are on disk.
    pub fn status(&self) -> ArtifactStatus {
        let (present, missing): (Vec<&'static str>, Vec<&'static str>) = ARTIFACTS
            .into_iter()
            .partition(|name| self.base_path.join(name).is_file());
        if missing.is_empty() {
            ArtifactStatus::Complete
        } else if present.is_empty() {
            ArtifactStatus::Missing
        } else {
            ArtifactStatus::Incomplete { present, missing }
        }
    }

    /// Check if a complete index exists
    pub fn exists(&self) -> bool {
        self.status() == ArtifactStatus::Complete
    }

    /// Saves all artifacts, metadata last.
    pub fn save(
        &self,
        state: &StrategyState,
        index: &FlatIndex,
        records: &RecordStore,
    ) -> Result<IndexMetadata, PersistenceError> {
        if index.len() != records.len() {
            return Err(StoreError::CountMismatch {
                records: records.len(),
                vectors: index.len(),
            }
            .into());
        }

        std::fs::create_dir_all(&self.base_path).map_err(|source| PersistenceError::Io {
            path: self.base_path.clone(),
            source,
        })?;
        // A stale metadata file would vouch for half-written artifacts
        let metadata_path = self.base_path.join(METADATA_FILE);
        if metadata_path.exists() {
            std::fs::remove_file(&metadata_path).map_err(|source| PersistenceError::Io {
                path: metadata_path.clone(),
                source,
            })?;
        }

        MmapVectorStorage::write(self.base_path.join(VECTORS_FILE), index)?;
        self.write_json(STRATEGY_FILE, state)?;
        self.write_json(RECORDS_FILE, &records.to_position_map())?;

        let metadata = IndexMetadata::new(
            state.strategy(),
            index.metric(),
            index.dimension().map_or(0, |d| d.get()),
            records.len(),
            records.checksum(),
        );
        metadata.save(&self.base_path)?;

        tracing::info!(
            path = %self.base_path.display(),
            records = records.len(),
            strategy = %metadata.strategy,
            "saved index"
        );
        Ok(metadata)
    }

    /// Loads and cross-checks all artifacts.
    pub fn load(&self) -> Result<PersistedIndex, PersistenceError> {
        match self.status() {
            ArtifactStatus::Complete => {}
            ArtifactStatus::Missing => {
                return Err(PersistenceError::NotFound {
                    path: self.base_path.clone(),
                });
            }
            ArtifactStatus::Incomplete { missing, .. } => {
                return Err(PersistenceError::IncompleteState {
                    path: self.base_path.clone(),
                    detail: format!("missing {}", missing.join(", ")),
                });
            }
        }

        let metadata = IndexMetadata::load(&self.base_path)?;

        let storage = MmapVectorStorage::open(self.base_path.join(VECTORS_FILE)).map_err(
            |e| match e {
                VectorError::InvalidFormat(detail) => self.incomplete(detail),
                other => other.into(),
            },
        )?;
        let header = storage.header();
        if header.count != metadata.record_count {
            return Err(self.incomplete(format!(
                "metadata lists {} records but {VECTORS_FILE} holds {} vectors",
                metadata.record_count, header.count
            )));
        }
        let dimension = header.dimension.map_or(0, |d| d.get());
        if dimension != metadata.dimension {
            return Err(PersistenceError::Mismatch {
                what: "vector dimension",
                expected: metadata.dimension.to_string(),
                found: dimension.to_string(),
            });
        }
        if header.metric != metadata.metric {
            return Err(PersistenceError::Mismatch {
                what: "distance metric",
                expected: metadata.metric.to_string(),
                found: header.metric.to_string(),
            });
        }
        let index = storage.load_index()?;

        let state: StrategyState = self.read_json(STRATEGY_FILE)?;
        if state.strategy() != metadata.strategy {
            return Err(PersistenceError::Mismatch {
                what: "embedding strategy",
                expected: metadata.strategy.to_string(),
                found: state.strategy().to_string(),
            });
        }

        let map: BTreeMap<u32, Record> = self.read_json(RECORDS_FILE)?;
        if map.len() != index.len() {
            return Err(self.incomplete(format!(
                "{RECORDS_FILE} holds {} records but {VECTORS_FILE} holds {} vectors",
                map.len(),
                index.len()
            )));
        }
        let records = RecordStore::from_position_map(map, index.len())?;

        let checksum = records.checksum();
        if checksum != metadata.corpus_checksum {
            return Err(PersistenceError::Mismatch {
                what: "corpus checksum",
                expected: metadata.corpus_checksum.clone(),
                found: checksum,
            });
        }

        tracing::info!(
            path = %self.base_path.display(),
            records = records.len(),
            strategy = %metadata.strategy,
            "loaded index"
        );
        Ok(PersistedIndex {
            state,
            index,
            records,
            metadata,
        })
    }

    /// Removes every artifact; missing files are ignored.
    pub fn clear(&self) -> Result<(), PersistenceError> {
        for name in ARTIFACTS {
            let path = self.base_path.join(name);
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => return Err(PersistenceError::Io { path, source }),
            }
        }
        Ok(())
    }

    fn incomplete(&self, detail: String) -> PersistenceError {
        PersistenceError::IncompleteState {
            path: self.base_path.clone(),
            detail,
        }
    }

    fn write_json<T: serde::Serialize>(&self, name: &str, value: &T) -> Result<(), PersistenceError> {
        let path = self.base_path.join(name);
        let json = serde_json::to_vec_pretty(value).map_err(|source| PersistenceError::Json {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, &json)
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<T, PersistenceError> {
        let path = self.base_path.join(name);
        let bytes = std::fs::read(&path).map_err(|source| PersistenceError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| PersistenceError::Json { path, source })
    }
}
