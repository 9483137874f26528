/// The main library module for wenda
pub mod config;
pub mod corpus;
pub mod display;
pub mod error;
pub mod io;
pub mod logging;
pub mod persistence;
pub mod retrieval;
pub mod store;
pub mod types;
pub mod vector;

// Explicit exports for better API clarity
pub use config::{EmbeddingStrategy, Settings};
pub use corpus::{CorpusError, load_records};
pub use error::{ErrorKind, RetrieverError, RetrieverResult};
pub use persistence::{ArtifactStatus, IndexMetadata, IndexPersistence, PersistenceError};
pub use retrieval::{CorpusSource, EngineState, Retriever, RetrieverStats};
pub use store::{RecordStore, StoreError};
pub use types::{Position, Record, SearchResult};
pub use vector::{DistanceMetric, EmbeddingGenerator, FlatIndex, VectorError};
