//! Embedding strategies that turn question text into vectors.
//!
//! Every strategy implements [`EmbeddingGenerator`]. Strategies are built from
//! an explicit [`EmbeddingConfig`] and can describe themselves as a
//! serializable [`StrategyState`] so a persisted index can be reloaded with the
//! exact encoder that produced it.

use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::{EmbeddingConfig, EmbeddingStrategy, TfIdfConfig};
use crate::vector::text;
use crate::vector::tfidf::{TfIdfState, TfIdfVectorizer};
use crate::vector::{DEFAULT_MOCK_DIMENSION, VectorDimension, VectorError};

/// Trait for generating embeddings from text.
///
/// Implementations must be deterministic: the same text always yields the
/// same vector, and a batch of N texts yields N vectors in input order.
pub trait EmbeddingGenerator: Send + Sync {
    /// Short strategy name used in logs and stats.
    fn name(&self) -> &'static str;

    /// Learns corpus-dependent state. Strategies without such state accept any corpus.
    fn fit(&mut self, _corpus: &[&str]) -> Result<(), VectorError> {
        Ok(())
    }

    /// Whether the generator is ready to encode.
    fn is_fitted(&self) -> bool {
        true
    }

    /// Generate embeddings for multiple texts.
    ///
    /// # Returns
    /// A vector of embeddings, one for each input text, or an error
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError>;

    /// Generate the embedding of a single text.
    fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, VectorError> {
        self.generate_embeddings(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| VectorError::EmbeddingFailed("Backend returned no embedding".into()))
    }

    /// Dimension of produced embeddings.
    ///
    /// `None` when the dimension is not known yet, e.g. a TF-IDF vectorizer
    /// fitted on an empty corpus.
    fn dimension(&self) -> Option<VectorDimension>;

    /// Serializable description of this generator, enough to rebuild it.
    fn state(&self) -> StrategyState;
}

/// Persisted form of an embedding strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "lowercase")]
pub enum StrategyState {
    FastEmbed { model: String, max_length: usize },
    TfIdf(TfIdfState),
    Mock { dimension: usize },
}

impl StrategyState {
    /// Strategy kind this state belongs to.
    #[must_use]
    pub fn strategy(&self) -> EmbeddingStrategy {
        match self {
            Self::FastEmbed { .. } => EmbeddingStrategy::FastEmbed,
            Self::TfIdf(_) => EmbeddingStrategy::TfIdf,
            Self::Mock { .. } => EmbeddingStrategy::Mock,
        }
    }
}

/// Creates an unfitted generator for the configured strategy.
pub fn create_generator(
    embedding: &EmbeddingConfig,
    tfidf: &TfIdfConfig,
) -> Result<Box<dyn EmbeddingGenerator>, VectorError> {
    match embedding.strategy {
        EmbeddingStrategy::FastEmbed => Ok(Box::new(FastEmbedGenerator::from_config(embedding)?)),
        EmbeddingStrategy::TfIdf => Ok(Box::new(TfIdfVectorizer::new(tfidf.clone()))),
        EmbeddingStrategy::Mock => {
            let dimension = VectorDimension::new(embedding.mock_dimension)?;
            Ok(Box::new(MockEmbeddingGenerator::with_dimension(dimension)))
        }
    }
}

/// Rebuilds a generator from its persisted state.
///
/// Model location and download settings still come from `embedding`; the
/// model identity and fitted state come from `state`.
pub fn generator_from_state(
    state: &StrategyState,
    embedding: &EmbeddingConfig,
) -> Result<Box<dyn EmbeddingGenerator>, VectorError> {
    match state {
        StrategyState::FastEmbed { model, max_length } => {
            let config = EmbeddingConfig {
                model: model.clone(),
                max_length: *max_length,
                ..embedding.clone()
            };
            Ok(Box::new(FastEmbedGenerator::from_config(&config)?))
        }
        StrategyState::TfIdf(state) => Ok(Box::new(TfIdfVectorizer::from_state(state.clone())?)),
        StrategyState::Mock { dimension } => Ok(Box::new(MockEmbeddingGenerator::with_dimension(
            VectorDimension::new(*dimension)?,
        ))),
    }
}

/// Parses a fastembed model name as written in the settings file.
pub fn parse_embedding_model(name: &str) -> Result<EmbeddingModel, VectorError> {
    match name {
        "AllMiniLML6V2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "AllMiniLML12V2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "ParaphraseMLMiniLML12V2" => Ok(EmbeddingModel::ParaphraseMLMiniLML12V2),
        "ParaphraseMLMpnetBaseV2" => Ok(EmbeddingModel::ParaphraseMLMpnetBaseV2),
        "BGESmallZHV15" => Ok(EmbeddingModel::BGESmallZHV15),
        "MultilingualE5Small" => Ok(EmbeddingModel::MultilingualE5Small),
        "MultilingualE5Base" => Ok(EmbeddingModel::MultilingualE5Base),
        other => Err(VectorError::UnknownModel(other.to_string())),
    }
}

/// Settings-file name of a fastembed model.
#[must_use]
pub fn model_to_string(model: &EmbeddingModel) -> String {
    format!("{model:?}")
}

/// Transformer embeddings through fastembed.
///
/// The default multilingual MiniLM model produces 384-dimensional,
/// L2-normalized vectors that handle Chinese questions well.
pub struct FastEmbedGenerator {
    model: Mutex<TextEmbedding>,
    model_name: String,
    max_length: usize,
    batch_size: usize,
    dimension: VectorDimension,
}

impl FastEmbedGenerator {
    /// Create a generator for the configured model.
    ///
    /// # Errors
    /// Returns an error if the model name is unknown or the model fails to
    /// initialize or download.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, VectorError> {
        let model = parse_embedding_model(&config.model)?;
        let cache_dir = config.models_dir();
        tracing::info!(
            model = %config.model,
            cache_dir = %cache_dir.display(),
            "loading embedding model"
        );

        let mut text_model = TextEmbedding::try_new(
            InitOptions::new(model)
                .with_cache_dir(cache_dir)
                .with_max_length(config.max_length)
                .with_show_download_progress(config.show_download_progress),
        )
        .map_err(|e| VectorError::ModelInit(e.to_string()))?;

        // Get dimensions by generating a test embedding
        let sample = text_model
            .embed(vec!["test"], None)
            .map_err(|e| VectorError::EmbeddingFailed(e.to_string()))?;
        let dimension = sample
            .into_iter()
            .next()
            .map(|v| v.len())
            .ok_or_else(|| VectorError::ModelInit("Model returned no sample embedding".into()))?;

        Ok(Self {
            model: Mutex::new(text_model),
            model_name: config.model.clone(),
            max_length: config.max_length,
            batch_size: config.batch_size.max(1),
            dimension: VectorDimension::new(dimension)?,
        })
    }
}

impl EmbeddingGenerator for FastEmbedGenerator {
    fn name(&self) -> &'static str {
        "fastembed"
    }

    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let text_strings: Vec<String> = texts.iter().map(|&s| s.to_string()).collect();

        let embeddings = self
            .model
            .lock()
            .map_err(|_| {
                VectorError::EmbeddingFailed(
                    "Failed to acquire embedding model lock - model may be poisoned".to_string(),
                )
            })?
            .embed(text_strings, Some(self.batch_size))
            .map_err(|e| {
                VectorError::EmbeddingFailed(format!("Failed to generate embeddings: {e}"))
            })?;

        if embeddings.len() != texts.len() {
            return Err(VectorError::EmbeddingFailed(format!(
                "Expected {} embeddings, backend returned {}",
                texts.len(),
                embeddings.len()
            )));
        }
        for embedding in &embeddings {
            self.dimension.validate_vector(embedding)?;
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> Option<VectorDimension> {
        Some(self.dimension)
    }

    fn state(&self) -> StrategyState {
        StrategyState::FastEmbed {
            model: self.model_name.clone(),
            max_length: self.max_length,
        }
    }
}

/// Deterministic embedding generator for tests and offline development.
///
/// Each analyzed term of the text is hashed into one of `dimension` buckets,
/// so texts sharing terms get similar vectors. Output is L2-normalized; text
/// with no terms maps to the zero vector.
#[derive(Debug, Clone)]
pub struct MockEmbeddingGenerator {
    dimension: VectorDimension,
}

impl Default for MockEmbeddingGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmbeddingGenerator {
    /// Create a new mock generator with 100 dimensions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dimension: DEFAULT_MOCK_DIMENSION,
        }
    }

    /// Create a generator with custom dimension for testing.
    #[must_use]
    pub fn with_dimension(dimension: VectorDimension) -> Self {
        Self { dimension }
    }

    fn bucket(&self, term: &str) -> usize {
        let mut hasher = Sha256::new();
        hasher.update(term.as_bytes());
        let digest = hasher.finalize();
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(prefix) % self.dimension.get() as u64) as usize
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension.get()];
        for term in text::analyze(text, 2) {
            embedding[self.bucket(&term)] += 1.0;
        }

        // Normalize to unit length (like real embeddings)
        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for val in &mut embedding {
                *val /= magnitude;
            }
        }
        embedding
    }
}

impl EmbeddingGenerator for MockEmbeddingGenerator {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> Option<VectorDimension> {
        Some(self.dimension)
    }

    fn state(&self) -> StrategyState {
        StrategyState::Mock {
            dimension: self.dimension.get(),
        }
    }
}
