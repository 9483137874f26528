//! Positional record store kept in lockstep with the vector index.

use std::collections::{BTreeMap, HashMap};

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::types::{Position, Record};

/// Errors raised while building or reading a [`RecordStore`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error(
        "Record count {records} does not match vector count {vectors}\nSuggestion: Encode every record exactly once, in order"
    )]
    CountMismatch { records: usize, vectors: usize },

    #[error("Duplicate record id '{id}' at positions {first} and {second}")]
    DuplicateId {
        id: String,
        first: Position,
        second: Position,
    },

    #[error("Record at position {position} has an empty {field}")]
    EmptyField {
        position: Position,
        field: &'static str,
    },

    #[error("Position {position} is out of range for a store of {len} records")]
    OutOfRange { position: Position, len: usize },

    #[error(
        "Stored record positions are not contiguous: expected {expected}, found {found}\nSuggestion: Rebuild the index"
    )]
    NonContiguous { expected: u32, found: u32 },

    #[error("Corpus too large: {0} records exceed the addressable position range")]
    TooManyRecords(usize),
}

impl StoreError {
    /// Whether the error comes from looking up a position rather than from bad input.
    pub fn is_lookup(&self) -> bool {
        matches!(self, Self::OutOfRange { .. })
    }
}

/// Ordered mapping position → record, with an id index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordStore {
    records: Vec<Record>,
    by_id: HashMap<String, Position>,
}

impl RecordStore {
    /// Builds the store, preserving input order.
    ///
    /// `vector_count` is the number of rows in the index built from the same
    /// records; any difference is rejected.
    pub fn build(records: Vec<Record>, vector_count: usize) -> Result<Self, StoreError> {
        if records.len() != vector_count {
            return Err(StoreError::CountMismatch {
                records: records.len(),
                vectors: vector_count,
            });
        }
        if records.len() > u32::MAX as usize {
            return Err(StoreError::TooManyRecords(records.len()));
        }

        let mut by_id = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            let position = Position::new(i as u32);
            for (field, value) in [
                ("id", &record.id),
                ("question", &record.question),
                ("answer", &record.answer),
            ] {
                if value.trim().is_empty() {
                    return Err(StoreError::EmptyField { position, field });
                }
            }
            if let Some(&first) = by_id.get(&record.id) {
                return Err(StoreError::DuplicateId {
                    id: record.id.clone(),
                    first,
                    second: position,
                });
            }
            by_id.insert(record.id.clone(), position);
        }

        Ok(Self { records, by_id })
    }

    /// Rebuilds a store from its persisted position map.
    ///
    /// Keys must run 0, 1, 2, ... without gaps.
    pub fn from_position_map(
        map: BTreeMap<u32, Record>,
        vector_count: usize,
    ) -> Result<Self, StoreError> {
        let mut records = Vec::with_capacity(map.len());
        for (expected, (found, record)) in (0u32..).zip(map) {
            if found != expected {
                return Err(StoreError::NonContiguous { expected, found });
            }
            records.push(record);
        }
        Self::build(records, vector_count)
    }

    /// Persisted form: position → record.
    pub fn to_position_map(&self) -> BTreeMap<u32, &Record> {
        (0u32..).zip(self.records.iter()).collect()
    }

    /// Record at a position.
    pub fn lookup(&self, position: Position) -> Result<&Record, StoreError> {
        self.records
            .get(position.as_index())
            .ok_or(StoreError::OutOfRange {
                position,
                len: self.records.len(),
            })
    }

    /// Record with an id, and its position.
    pub fn find_by_id(&self, id: &str) -> Option<(Position, &Record)> {
        let position = *self.by_id.get(id)?;
        self.records.get(position.as_index()).map(|r| (position, r))
    }

    /// All distinct tags, sorted.
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .records
            .iter()
            .flat_map(|r| r.tags.iter().cloned())
            .collect();
        tags.sort();
        tags.dedup();
        tags
    }

    /// SHA-256 over ids and questions in position order.
    pub fn checksum(&self) -> String {
        Self::checksum_of(&self.records)
    }

    /// [`checksum`](Self::checksum) of records that have not been built into a store.
    pub fn checksum_of(records: &[Record]) -> String {
        let mut hasher = Sha256::new();
        for record in records {
            hasher.update(record.id.as_bytes());
            hasher.update([0x1f]);
            hasher.update(record.question.as_bytes());
            hasher.update([0x1e]);
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn questions(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.question.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
