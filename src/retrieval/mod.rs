//! Query-time retrieval over a built or loaded index.
//!
//! [`Retriever`] owns the active snapshot (strategy, index, records) and the
//! [`QueryCache`]. `search(query, k)` is the operation every presentation
//! layer consumes.

mod cache;
mod engine;

pub use cache::QueryCache;
pub use engine::{CorpusSource, EngineState, Retriever, RetrieverStats};
