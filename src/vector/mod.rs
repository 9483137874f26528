//! Vector layer: embedding strategies, the flat index and its on-disk form.
//!
//! # Architecture
//! An [`EmbeddingGenerator`] turns question text into vectors, a [`FlatIndex`]
//! ranks them against a query vector by exact scan, and [`MmapVectorStorage`]
//! persists the index rows in position order.

mod embedding;
mod index;
mod storage;
pub mod text;
mod tfidf;
mod types;

// Re-export core types for public API
pub use embedding::{
    EmbeddingGenerator, FastEmbedGenerator, MockEmbeddingGenerator, StrategyState,
    create_generator, generator_from_state, model_to_string, parse_embedding_model,
};
pub use index::{DistanceMetric, FlatIndex, Neighbor};
pub use storage::{MmapVectorStorage, VectorFileHeader};
pub use tfidf::{TfIdfState, TfIdfVectorizer};
pub use types::{DEFAULT_MOCK_DIMENSION, Position, Score, VectorDimension, VectorError};
