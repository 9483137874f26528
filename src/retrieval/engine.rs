//! The retrieval engine: encode, rank, join.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::config::{EmbeddingConfig, RetrievalConfig, Settings, TfIdfConfig};
use crate::error::{RetrieverError, RetrieverResult};
use crate::persistence::{IndexMetadata, IndexPersistence, PersistenceError};
use crate::retrieval::QueryCache;
use crate::store::RecordStore;
use crate::types::{Record, SearchResult};
use crate::vector::{
    DistanceMetric, EmbeddingGenerator, FlatIndex, VectorError, create_generator,
    generator_from_state,
};

/// Lifecycle of a [`Retriever`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Uninitialized,
    Building,
    Loading,
    Ready,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Building => "building",
            Self::Loading => "loading",
            Self::Ready => "ready",
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where [`Retriever::initialize`] gets its corpus from.
#[derive(Debug, Clone)]
pub enum CorpusSource {
    /// Fit and encode these records.
    Records(Vec<Record>),
    /// Load a previously saved index directory.
    Persisted(PathBuf),
    /// Load `path` if it was built from `records`; otherwise build from
    /// `records` and save the result to `path`.
    PersistedOrBuild {
        path: PathBuf,
        records: Vec<Record>,
        force_rebuild: bool,
    },
}

/// Engine statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrieverStats {
    pub state: EngineState,
    pub record_count: usize,
    pub strategy: Option<&'static str>,
    pub dimension: Option<usize>,
    pub metric: Option<DistanceMetric>,
    pub cache_entries: usize,
    pub generation: u64,
}

/// Everything one search needs, swapped as a unit.
struct Snapshot {
    generator: Box<dyn EmbeddingGenerator>,
    index: FlatIndex,
    records: RecordStore,
    generation: u64,
}

/// Semantic question retriever.
///
/// One ready instance can be shared across threads. Rebuilding constructs a
/// complete new snapshot before swapping it in, so in-flight searches finish
/// against the snapshot they started with.
pub struct Retriever {
    embedding: EmbeddingConfig,
    tfidf: TfIdfConfig,
    retrieval: RetrievalConfig,
    state: RwLock<EngineState>,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    cache: QueryCache,
    generation: AtomicU64,
    rebuild: Mutex<()>,
}

impl fmt::Debug for Retriever {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retriever")
            .field("state", &*self.state.read())
            .field("strategy", &self.embedding.strategy)
            .field("metric", &self.retrieval.metric)
            .field("cache_entries", &self.cache.len())
            .finish()
    }
}

impl Retriever {
    /// Creates an uninitialized engine.
    pub fn new(settings: &Settings) -> Self {
        Self::with_config(
            settings.embedding.clone(),
            settings.tfidf.clone(),
            settings.retrieval.clone(),
        )
    }

    pub fn with_config(
        embedding: EmbeddingConfig,
        tfidf: TfIdfConfig,
        retrieval: RetrievalConfig,
    ) -> Self {
        let cache = QueryCache::new(if retrieval.cache_enabled {
            retrieval.cache_capacity
        } else {
            0
        });
        Self {
            embedding,
            tfidf,
            retrieval,
            state: RwLock::new(EngineState::Uninitialized),
            snapshot: RwLock::new(None),
            cache,
            generation: AtomicU64::new(0),
            rebuild: Mutex::new(()),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        *self.state.read()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == EngineState::Ready
    }

    /// Brings the engine to `Ready` from the given source.
    ///
    /// On failure the engine keeps whatever state it had before the call.
    /// For [`CorpusSource::PersistedOrBuild`] a persisted index is reused only
    /// if it was built from the same ids and questions; a rebuilt snapshot is
    /// saved before it becomes active.
    pub fn initialize(&self, source: CorpusSource) -> RetrieverResult<()> {
        match source {
            CorpusSource::Records(records) => self.build(records),
            CorpusSource::Persisted(path) => self.load(&path),
            CorpusSource::PersistedOrBuild {
                path,
                records,
                force_rebuild,
            } => {
                if force_rebuild {
                    tracing::info!(path = %path.display(), "forced rebuild, skipping persisted index");
                } else if Self::corpus_changed(&path, &records) {
                    tracing::info!(path = %path.display(), "corpus changed since the index was saved, rebuilding");
                } else {
                    match self.load(&path) {
                        Ok(()) => {
                            tracing::info!(path = %path.display(), "reusing persisted index");
                            return Ok(());
                        }
                        Err(RetrieverError::Persistence(PersistenceError::NotFound { .. })) => {
                            tracing::info!(path = %path.display(), "no persisted index, building");
                        }
                        Err(e) => {
                            tracing::warn!(
                                path = %path.display(),
                                error = %e,
                                "persisted index unusable, rebuilding"
                            );
                        }
                    }
                }
                self.build_and_save(records, &path)
            }
        }
    }

    /// True when `path` holds metadata for a different corpus.
    fn corpus_changed(path: &Path, records: &[Record]) -> bool {
        match IndexMetadata::load(path) {
            Ok(metadata) => metadata.corpus_checksum != RecordStore::checksum_of(records),
            Err(_) => false,
        }
    }

    /// Builds a snapshot, persists it, and only then swaps it in.
    fn build_and_save(&self, records: Vec<Record>, path: &Path) -> RetrieverResult<()> {
        let _guard = self.rebuild.lock();
        self.transition(EngineState::Building, || {
            let generator = create_generator(&self.embedding, &self.tfidf)?;
            let (generator, index, records) = self.assemble(generator, records)?;
            IndexPersistence::new(path).save(&generator.state(), &index, &records)?;
            Ok((generator, index, records))
        })
    }

    /// Fits the configured strategy on `records` and builds a new snapshot.
    pub fn build(&self, records: Vec<Record>) -> RetrieverResult<()> {
        let _guard = self.rebuild.lock();
        self.transition(EngineState::Building, || {
            let generator = create_generator(&self.embedding, &self.tfidf)?;
            self.assemble(generator, records)
        })
    }

    /// Builds a snapshot with a caller-supplied generator.
    pub fn build_with_generator(
        &self,
        generator: Box<dyn EmbeddingGenerator>,
        records: Vec<Record>,
    ) -> RetrieverResult<()> {
        let _guard = self.rebuild.lock();
        self.transition(EngineState::Building, || self.assemble(generator, records))
    }

    /// Loads a persisted index directory.
    pub fn load(&self, path: &Path) -> RetrieverResult<()> {
        let _guard = self.rebuild.lock();
        self.transition(EngineState::Loading, || {
            let persisted = IndexPersistence::new(path).load()?;
            let generator = generator_from_state(&persisted.state, &self.embedding)?;

            if let (Some(stored), Some(current)) =
                (persisted.index.dimension(), generator.dimension())
            {
                if stored != current {
                    return Err(PersistenceError::Mismatch {
                        what: "embedding dimension",
                        expected: stored.to_string(),
                        found: current.to_string(),
                    }
                    .into());
                }
            }
            if persisted.index.metric() != self.retrieval.metric {
                tracing::warn!(
                    persisted = %persisted.index.metric(),
                    configured = %self.retrieval.metric,
                    "using the metric the index was built with"
                );
            }

            Ok((generator, persisted.index, persisted.records))
        })
    }

    /// Persists the current snapshot to `path`.
    pub fn save(&self, path: &Path) -> RetrieverResult<IndexMetadata> {
        let snapshot = self.ready_snapshot()?;
        let metadata = IndexPersistence::new(path).save(
            &snapshot.generator.state(),
            &snapshot.index,
            &snapshot.records,
        )?;
        Ok(metadata)
    }

    fn assemble(
        &self,
        mut generator: Box<dyn EmbeddingGenerator>,
        records: Vec<Record>,
    ) -> RetrieverResult<(Box<dyn EmbeddingGenerator>, FlatIndex, RecordStore)> {
        let questions: Vec<&str> = records.iter().map(|r| r.question.as_str()).collect();
        generator.fit(&questions)?;

        let vectors = if questions.is_empty() {
            Vec::new()
        } else {
            generator.generate_embeddings(&questions)?
        };
        let index = FlatIndex::build(self.retrieval.metric, vectors)?;
        if let (Some(built), Some(declared)) = (index.dimension(), generator.dimension()) {
            if built != declared {
                return Err(VectorError::DimensionMismatch {
                    expected: declared.get(),
                    actual: built.get(),
                }
                .into());
            }
        }

        let records = RecordStore::build(records, index.len())?;
        Ok((generator, index, records))
    }

    /// Runs `work` in `during` state and swaps in its result, or restores the
    /// previous state on error.
    fn transition<F>(&self, during: EngineState, work: F) -> RetrieverResult<()>
    where
        F: FnOnce() -> RetrieverResult<(Box<dyn EmbeddingGenerator>, FlatIndex, RecordStore)>,
    {
        let previous = std::mem::replace(&mut *self.state.write(), during);

        match work() {
            Ok((generator, index, records)) => {
                let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                let snapshot = Arc::new(Snapshot {
                    generator,
                    index,
                    records,
                    generation,
                });
                tracing::info!(
                    records = snapshot.records.len(),
                    strategy = snapshot.generator.name(),
                    generation,
                    "retriever ready"
                );
                *self.snapshot.write() = Some(snapshot);
                self.cache.clear();
                *self.state.write() = EngineState::Ready;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, state = %during, "initialization failed");
                *self.state.write() = previous;
                Err(e)
            }
        }
    }

    fn ready_snapshot(&self) -> RetrieverResult<Arc<Snapshot>> {
        let state = self.state();
        match self.snapshot.read().as_ref() {
            Some(snapshot) if state != EngineState::Uninitialized => Ok(Arc::clone(snapshot)),
            _ => Err(RetrieverError::NotInitialized {
                state: state.as_str(),
            }),
        }
    }

    /// Top-k records for a query, best first.
    ///
    /// `k` larger than the corpus returns every record. An empty corpus
    /// returns an empty list.
    pub fn search(&self, query: &str, k: usize) -> RetrieverResult<Vec<SearchResult>> {
        let snapshot = self.ready_snapshot()?;
        if query.trim().is_empty() {
            return Err(RetrieverError::EmptyQuery);
        }
        if k == 0 {
            return Err(RetrieverError::InvalidK { k });
        }

        if let Some(hit) = self.cache.get(query, k, snapshot.generation) {
            tracing::debug!(query, k, "cache hit");
            return Ok(hit.as_ref().clone());
        }

        let results = Self::run_query(&snapshot, query, k)?;
        self.cache
            .insert(query, k, snapshot.generation, Arc::new(results.clone()));
        Ok(results)
    }

    /// Like [`search`](Self::search), dropping results scoring below `min_score`.
    pub fn search_with_threshold(
        &self,
        query: &str,
        k: usize,
        min_score: f32,
    ) -> RetrieverResult<Vec<SearchResult>> {
        let mut results = self.search(query, k)?;
        // Results are sorted by score, so the survivors keep ranks 1..n
        results.retain(|r| r.score >= min_score);
        Ok(results)
    }

    /// Top-k records carrying `tag`, chosen from the best `2k` candidates.
    pub fn search_by_tag(
        &self,
        query: &str,
        tag: &str,
        k: usize,
    ) -> RetrieverResult<Vec<SearchResult>> {
        if k == 0 {
            return Err(RetrieverError::InvalidK { k });
        }
        let candidates = self.search(query, k.saturating_mul(2))?;
        Ok(candidates
            .into_iter()
            .filter(|r| r.tags.iter().any(|t| t == tag))
            .take(k)
            .enumerate()
            .map(|(i, mut r)| {
                r.rank = i + 1;
                r
            })
            .collect())
    }

    /// Record with the given id.
    pub fn record_by_id(&self, id: &str) -> RetrieverResult<Record> {
        let snapshot = self.ready_snapshot()?;
        snapshot
            .records
            .find_by_id(id)
            .map(|(_, record)| record.clone())
            .ok_or_else(|| RetrieverError::UnknownId { id: id.to_string() })
    }

    /// All tags in the corpus, sorted and deduplicated.
    pub fn categories(&self) -> RetrieverResult<Vec<String>> {
        Ok(self.ready_snapshot()?.records.tags())
    }

    pub fn stats(&self) -> RetrieverStats {
        let state = self.state();
        let snapshot = self.snapshot.read().clone();
        match snapshot {
            Some(s) => RetrieverStats {
                state,
                record_count: s.records.len(),
                strategy: Some(s.generator.name()),
                dimension: s.index.dimension().map(|d| d.get()),
                metric: Some(s.index.metric()),
                cache_entries: self.cache.len(),
                generation: s.generation,
            },
            None => RetrieverStats {
                state,
                record_count: 0,
                strategy: None,
                dimension: None,
                metric: None,
                cache_entries: self.cache.len(),
                generation: 0,
            },
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Default k from the retrieval settings.
    pub fn default_k(&self) -> usize {
        self.retrieval.default_k
    }

    fn run_query(snapshot: &Snapshot, query: &str, k: usize) -> RetrieverResult<Vec<SearchResult>> {
        if snapshot.index.is_empty() {
            return Ok(Vec::new());
        }

        let vector = snapshot.generator.generate_embedding(query)?;
        let neighbors = snapshot.index.query(&vector, k)?;

        neighbors
            .into_iter()
            .enumerate()
            .map(|(i, neighbor)| {
                let record = snapshot.records.lookup(neighbor.position)?;
                Ok(SearchResult::new(
                    neighbor.position,
                    record,
                    neighbor.score.get(),
                    i + 1,
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingStrategy;
    use crate::error::ErrorKind;
    use crate::vector::{MockEmbeddingGenerator, VectorDimension};

    fn config(strategy: EmbeddingStrategy) -> Settings {
        let mut settings = Settings::default();
        settings.embedding.strategy = strategy;
        settings
    }

    fn corpus() -> Vec<Record> {
        vec![
            Record::new("1", "墨尔本怎么坐公交车", "使用Myki卡乘坐").with_tags(["交通"]),
            Record::new("2", "租房需要注意什么", "仔细阅读合同").with_tags(["生活"]),
            Record::new("3", "学生卡怎么办理公交优惠", "在PTV网站申请").with_tags(["交通", "学生"]),
        ]
    }

    #[test]
    fn test_search_before_initialize() {
        let retriever = Retriever::new(&config(EmbeddingStrategy::Mock));
        let err = retriever.search("公交车", 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(matches!(err, RetrieverError::NotInitialized { .. }));
    }

    #[test]
    fn test_tfidf_search_ranks_matching_question_first() {
        let retriever = Retriever::new(&config(EmbeddingStrategy::TfIdf));
        retriever.initialize(CorpusSource::Records(corpus())).unwrap();
        assert!(retriever.is_ready());

        let results = retriever.search("墨尔本公交车", 3).unwrap();
        assert_eq!(results[0].id, "1");
        let ranks: Vec<usize> = results.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, (1..=results.len()).collect::<Vec<_>>());
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_query_validation() {
        let retriever = Retriever::new(&config(EmbeddingStrategy::Mock));
        retriever.initialize(CorpusSource::Records(corpus())).unwrap();

        assert!(matches!(
            retriever.search("   ", 3),
            Err(RetrieverError::EmptyQuery)
        ));
        assert!(matches!(
            retriever.search("公交车", 0),
            Err(RetrieverError::InvalidK { k: 0 })
        ));
    }

    #[test]
    fn test_mismatched_generator_leaves_engine_uninitialized() {
        struct ShortGenerator(MockEmbeddingGenerator);

        impl EmbeddingGenerator for ShortGenerator {
            fn name(&self) -> &'static str {
                "short"
            }
            fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
                let mut out = self.0.generate_embeddings(texts)?;
                out.pop();
                Ok(out)
            }
            fn dimension(&self) -> Option<VectorDimension> {
                self.0.dimension()
            }
            fn state(&self) -> crate::vector::StrategyState {
                self.0.state()
            }
        }

        let retriever = Retriever::new(&config(EmbeddingStrategy::Mock));
        let err = retriever
            .build_with_generator(Box::new(ShortGenerator(MockEmbeddingGenerator::new())), corpus())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(retriever.state(), EngineState::Uninitialized);
    }

    #[test]
    fn test_failed_rebuild_keeps_previous_snapshot() {
        let retriever = Retriever::new(&config(EmbeddingStrategy::Mock));
        retriever.initialize(CorpusSource::Records(corpus())).unwrap();

        let mut bad = corpus();
        bad[1].id = "1".to_string();
        assert!(retriever.build(bad).is_err());

        assert!(retriever.is_ready());
        assert_eq!(retriever.stats().record_count, 3);
        assert!(retriever.search("公交车", 1).is_ok());
    }

    #[test]
    fn test_cache_is_invalidated_by_rebuild() {
        let retriever = Retriever::new(&config(EmbeddingStrategy::Mock));
        retriever.initialize(CorpusSource::Records(corpus())).unwrap();
        let first = retriever.search("租房", 1).unwrap();
        assert_eq!(retriever.stats().cache_entries, 1);
        assert_eq!(retriever.search("租房", 1).unwrap(), first);

        retriever
            .build(vec![Record::new("x", "租房合同怎么签", "找中介")])
            .unwrap();
        assert_eq!(retriever.stats().cache_entries, 0);
        assert_eq!(retriever.search("租房", 1).unwrap()[0].id, "x");
    }

    #[test]
    fn test_empty_corpus_searches_empty() {
        let retriever = Retriever::new(&config(EmbeddingStrategy::TfIdf));
        retriever.initialize(CorpusSource::Records(Vec::new())).unwrap();
        assert!(retriever.is_ready());
        assert!(retriever.search("公交车", 5).unwrap().is_empty());
        assert_eq!(retriever.stats().dimension, None);
    }

    #[test]
    fn test_search_by_tag_and_threshold() {
        let retriever = Retriever::new(&config(EmbeddingStrategy::TfIdf));
        retriever.initialize(CorpusSource::Records(corpus())).unwrap();

        let tagged = retriever.search_by_tag("公交", "学生", 2).unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].id, "3");
        assert_eq!(tagged[0].rank, 1);

        let strict = retriever.search_with_threshold("墨尔本公交车", 3, 0.99).unwrap();
        assert!(strict.iter().all(|r| r.score >= 0.99));
        let loose = retriever.search_with_threshold("墨尔本公交车", 3, -1.0).unwrap();
        assert_eq!(loose.len(), 3);
    }

    #[test]
    fn test_lookup_helpers() {
        let retriever = Retriever::new(&config(EmbeddingStrategy::Mock));
        retriever.initialize(CorpusSource::Records(corpus())).unwrap();

        assert_eq!(retriever.record_by_id("2").unwrap().question, "租房需要注意什么");
        assert_eq!(
            retriever.record_by_id("404").unwrap_err().kind(),
            ErrorKind::Lookup
        );
        assert_eq!(retriever.categories().unwrap(), vec!["交通", "学生", "生活"]);

        let stats = retriever.stats();
        assert_eq!(stats.state, EngineState::Ready);
        assert_eq!(stats.strategy, Some("mock"));
        assert_eq!(stats.dimension, Some(100));
        assert_eq!(stats.metric, Some(DistanceMetric::Cosine));
    }

    /// Wraps the mock generator; emits `value` everywhere or fails once `fail` is set.
    struct FlakyGenerator {
        inner: MockEmbeddingGenerator,
        fail: Arc<std::sync::atomic::AtomicBool>,
        value: Option<f32>,
    }

    impl FlakyGenerator {
        fn new() -> (Self, Arc<std::sync::atomic::AtomicBool>) {
            let fail = Arc::new(std::sync::atomic::AtomicBool::new(false));
            let generator = Self {
                inner: MockEmbeddingGenerator::new(),
                fail: Arc::clone(&fail),
                value: None,
            };
            (generator, fail)
        }
    }

    impl EmbeddingGenerator for FlakyGenerator {
        fn name(&self) -> &'static str {
            "flaky"
        }
        fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(VectorError::EmbeddingFailed("backend went away".into()));
            }
            let mut out = self.inner.generate_embeddings(texts)?;
            if let Some(value) = self.value {
                for row in &mut out {
                    row.fill(value);
                }
            }
            Ok(out)
        }
        fn dimension(&self) -> Option<VectorDimension> {
            self.inner.dimension()
        }
        fn state(&self) -> crate::vector::StrategyState {
            self.inner.state()
        }
    }

    #[test]
    fn test_nan_embeddings_are_a_backend_failure() {
        let (mut generator, _) = FlakyGenerator::new();
        generator.value = Some(f32::NAN);

        let retriever = Retriever::new(&config(EmbeddingStrategy::Mock));
        let err = retriever
            .build_with_generator(Box::new(generator), corpus())
            .unwrap_err();
        assert!(matches!(
            err,
            RetrieverError::Vector(VectorError::NonFiniteEmbedding { .. })
        ));
        assert_eq!(err.kind(), ErrorKind::Backend);
        assert_eq!(err.status_code(), "EMBEDDING_ERROR");
        assert_eq!(retriever.state(), EngineState::Uninitialized);
    }

    #[test]
    fn test_backend_failure_during_search_leaves_cache_alone() {
        let (generator, fail) = FlakyGenerator::new();
        let retriever = Retriever::new(&config(EmbeddingStrategy::Mock));
        retriever
            .build_with_generator(Box::new(generator), corpus())
            .unwrap();
        let warm = retriever.search("租房", 1).unwrap();
        let cached = retriever.stats().cache_entries;
        assert_eq!(cached, 1);

        fail.store(true, Ordering::SeqCst);
        let err = retriever.search("公交车", 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);
        assert_eq!(retriever.stats().cache_entries, cached);
        assert!(retriever.is_ready());

        // Cached answers still come back while the backend is down
        assert_eq!(retriever.search("租房", 1).unwrap(), warm);
    }

    #[test]
    fn test_failed_save_keeps_engine_uninitialized() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"occupied").unwrap();

        let retriever = Retriever::new(&config(EmbeddingStrategy::Mock));
        let err = retriever
            .initialize(CorpusSource::PersistedOrBuild {
                path: blocker.join("index"),
                records: corpus(),
                force_rebuild: false,
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert_eq!(retriever.state(), EngineState::Uninitialized);
        assert!(matches!(
            retriever.search("公交车", 1),
            Err(RetrieverError::NotInitialized { .. })
        ));
    }

    #[test]
    fn test_failed_save_keeps_previous_snapshot() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"occupied").unwrap();

        let retriever = Retriever::new(&config(EmbeddingStrategy::Mock));
        retriever.initialize(CorpusSource::Records(corpus())).unwrap();
        let generation = retriever.stats().generation;

        let result = retriever.initialize(CorpusSource::PersistedOrBuild {
            path: blocker.join("index"),
            records: vec![Record::new("x", "租房合同怎么签", "找中介")],
            force_rebuild: true,
        });
        assert!(result.is_err());
        assert!(retriever.is_ready());
        assert_eq!(retriever.stats().record_count, 3);
        assert_eq!(retriever.stats().generation, generation);
    }
}
