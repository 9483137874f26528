//! Configuration module for the retrieval core.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `WENDA_` and use double underscores
//! to separate nested levels:
//! - `WENDA_EMBEDDING__STRATEGY=tfidf` sets `embedding.strategy`
//! - `WENDA_RETRIEVAL__DEFAULT_K=3` sets `retrieval.default_k`
//! - `WENDA_RETRIEVAL__CACHE_ENABLED=false` sets `retrieval.cache_enabled`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::vector::DistanceMetric;

/// Name of the per-project configuration directory.
pub const CONFIG_DIR: &str = ".wenda";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Directory holding the persisted index artifacts
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Global debug mode
    #[serde(default = "default_false")]
    pub debug: bool,

    /// Embedding strategy settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// TF-IDF vectorizer settings (used when `embedding.strategy = "tfidf"`)
    #[serde(default)]
    pub tfidf: TfIdfConfig,

    /// Search settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// Which embedding strategy turns text into vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingStrategy {
    /// Dense transformer embeddings through fastembed
    #[default]
    FastEmbed,
    /// Sparse TF-IDF vectors over character n-grams
    TfIdf,
    /// Deterministic hashed vectors, for tests and offline development
    Mock,
}

impl EmbeddingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FastEmbed => "fastembed",
            Self::TfIdf => "tfidf",
            Self::Mock => "mock",
        }
    }
}

impl fmt::Display for EmbeddingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmbeddingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fastembed" => Ok(Self::FastEmbed),
            "tfidf" | "tf-idf" => Ok(Self::TfIdf),
            "mock" => Ok(Self::Mock),
            other => Err(format!(
                "Unknown embedding strategy '{other}'. Expected one of: fastembed, tfidf, mock"
            )),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EmbeddingConfig {
    /// Strategy used to encode corpus questions and queries
    #[serde(default)]
    pub strategy: EmbeddingStrategy,

    /// fastembed model name
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Maximum number of tokens per text; longer input is truncated
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Texts per batch when encoding the corpus
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Where downloaded models are cached (defaults to the user cache dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Show a progress bar while a model downloads
    #[serde(default = "default_true")]
    pub show_download_progress: bool,

    /// Dimension of the mock strategy's vectors
    #[serde(default = "default_mock_dimension")]
    pub mock_dimension: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TfIdfConfig {
    /// Keep at most this many terms, ranked by corpus frequency
    #[serde(default = "default_max_features")]
    pub max_features: usize,

    /// Longest n-gram (in tokens) added to the vocabulary
    #[serde(default = "default_ngram_max")]
    pub ngram_max: usize,

    /// Drop terms that appear in fewer documents than this
    #[serde(default = "default_min_df")]
    pub min_df: usize,

    /// Drop terms that appear in more than this fraction of documents
    #[serde(default = "default_max_df")]
    pub max_df: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RetrievalConfig {
    /// Number of results returned when the caller does not pass k
    #[serde(default = "default_k")]
    pub default_k: usize,

    /// Distance policy of the vector index
    #[serde(default)]
    pub metric: DistanceMetric,

    /// Cache search results per (query, k)
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    /// Maximum number of cached queries
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_index_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("index")
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_embedding_model() -> String {
    "ParaphraseMLMiniLML12V2".to_string()
}
fn default_max_length() -> usize {
    128
}
fn default_batch_size() -> usize {
    32
}
fn default_mock_dimension() -> usize {
    100
}
fn default_max_features() -> usize {
    5000
}
fn default_ngram_max() -> usize {
    2
}
fn default_min_df() -> usize {
    1
}
fn default_max_df() -> f32 {
    1.0
}
fn default_k() -> usize {
    5
}
fn default_cache_capacity() -> usize {
    1024
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            index_path: default_index_path(),
            debug: false,
            embedding: EmbeddingConfig::default(),
            tfidf: TfIdfConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            strategy: EmbeddingStrategy::default(),
            model: default_embedding_model(),
            max_length: default_max_length(),
            batch_size: default_batch_size(),
            cache_dir: None,
            show_download_progress: true,
            mock_dimension: default_mock_dimension(),
        }
    }
}

impl EmbeddingConfig {
    /// Directory used to cache downloaded models.
    pub fn models_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("wenda")
                .join("models")
        })
    }
}

impl Default for TfIdfConfig {
    fn default() -> Self {
        Self {
            max_features: default_max_features(),
            ngram_max: default_ngram_max(),
            min_df: default_min_df(),
            max_df: default_max_df(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
            metric: DistanceMetric::default(),
            cache_enabled: true,
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("settings.toml"));

        Self::figment(Toml::file(config_path))
            .extract()
            .map_err(Box::new)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(Toml::file(path.as_ref()))
            .extract()
            .map_err(Box::new)
    }

    fn figment(file: figment::providers::Data<Toml>) -> Figment {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(file)
            // Double underscore separates nested levels, single underscore stays in the name
            .merge(Env::prefixed("WENDA_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
    }

    /// Find the workspace configuration by looking for a .wenda directory
    /// from the current directory up to the root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        for ancestor in current.ancestors() {
            let config_dir = ancestor.join(CONFIG_DIR);
            if config_dir.is_dir() {
                return Some(config_dir.join("settings.toml"));
            }
        }

        None
    }

    /// Save current configuration to file
    pub fn save(
        &self,
        path: impl AsRef<std::path::Path>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file with helpful comments
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(CONFIG_DIR).join("settings.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = r#"# wenda configuration file

# Version of the configuration schema
version = 1

# Directory holding the persisted index (vectors, strategy state, records)
index_path = ".wenda/index"

# Global debug mode
debug = false

[embedding]
# Strategy: "fastembed" (transformer), "tfidf" or "mock"
strategy = "fastembed"

# fastembed model; the multilingual MiniLM handles Chinese questions well
model = "ParaphraseMLMiniLML12V2"

# Longer inputs are truncated to this many tokens
max_length = 128

# Texts per encoding batch
batch_size = 32

show_download_progress = true

# Dimension of the mock strategy's vectors
mock_dimension = 100

[tfidf]
max_features = 5000
ngram_max = 2
min_df = 1
# Terms in more than this fraction of questions are dropped
max_df = 1.0

[retrieval]
# Results returned when no k is given
default_k = 5

# "cosine" (inner product on normalized vectors) or "l2" (score = 1 / (1 + distance))
metric = "cosine"

cache_enabled = true
cache_capacity = 1024
"#;

        std::fs::write(&config_path, template)?;

        Ok(config_path)
    }
}
