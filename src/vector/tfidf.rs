//! TF-IDF vectorizer over character n-grams.
//!
//! Terms come from [`text::analyze`]: CJK ideographs and Latin words plus
//! their n-grams. Weights use smoothed inverse document frequency,
//! `idf = ln((1 + n) / (1 + df)) + 1`, applied to raw term counts, and each
//! vector is L2-normalized so cosine similarity is an inner product.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::TfIdfConfig;
use crate::vector::embedding::{EmbeddingGenerator, StrategyState};
use crate::vector::text;
use crate::vector::{VectorDimension, VectorError};

/// Fitted state of a [`TfIdfVectorizer`], persisted as `strategy.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfIdfState {
    pub config: TfIdfConfig,
    /// Terms in column order (sorted).
    pub vocabulary: Vec<String>,
    /// Inverse document frequency per column.
    pub idf: Vec<f32>,
    /// Number of documents the vectorizer was fitted on.
    pub document_count: usize,
}

#[derive(Debug)]
struct Fitted {
    vocabulary: Vec<String>,
    columns: HashMap<String, usize>,
    idf: Vec<f32>,
    document_count: usize,
}

/// Vocabulary-based strategy; must be fitted before it can encode.
#[derive(Debug)]
pub struct TfIdfVectorizer {
    config: TfIdfConfig,
    fitted: Option<Fitted>,
}

impl TfIdfVectorizer {
    #[must_use]
    pub fn new(config: TfIdfConfig) -> Self {
        Self {
            config,
            fitted: None,
        }
    }

    /// Restores a fitted vectorizer.
    pub fn from_state(state: TfIdfState) -> Result<Self, VectorError> {
        if state.idf.len() != state.vocabulary.len() {
            return Err(VectorError::InvalidFormat(format!(
                "TF-IDF state has {} terms but {} idf weights",
                state.vocabulary.len(),
                state.idf.len()
            )));
        }
        if state.vocabulary.windows(2).any(|w| w[0] >= w[1]) {
            return Err(VectorError::InvalidFormat(
                "TF-IDF vocabulary is not sorted and unique".to_string(),
            ));
        }

        let columns = state
            .vocabulary
            .iter()
            .enumerate()
            .map(|(i, term)| (term.clone(), i))
            .collect();

        Ok(Self {
            config: state.config,
            fitted: Some(Fitted {
                vocabulary: state.vocabulary,
                columns,
                idf: state.idf,
                document_count: state.document_count,
            }),
        })
    }

    /// Number of terms in the fitted vocabulary.
    #[must_use]
    pub fn vocabulary_len(&self) -> usize {
        self.fitted.as_ref().map_or(0, |f| f.vocabulary.len())
    }

    fn fitted(&self) -> Result<&Fitted, VectorError> {
        self.fitted
            .as_ref()
            .ok_or(VectorError::NotFitted { strategy: "tfidf" })
    }

    fn encode(&self, fitted: &Fitted, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; fitted.vocabulary.len()];
        for term in text::analyze(text, self.config.ngram_max) {
            if let Some(&col) = fitted.columns.get(&term) {
                vector[col] += 1.0;
            }
        }
        for (value, idf) in vector.iter_mut().zip(&fitted.idf) {
            *value *= idf;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

impl EmbeddingGenerator for TfIdfVectorizer {
    fn name(&self) -> &'static str {
        "tfidf"
    }

    fn fit(&mut self, corpus: &[&str]) -> Result<(), VectorError> {
        let n = corpus.len();
        let mut document_frequency: HashMap<String, usize> = HashMap::new();
        let mut term_frequency: HashMap<String, usize> = HashMap::new();

        for doc in corpus {
            let terms = text::analyze(doc, self.config.ngram_max);
            let mut seen = HashSet::new();
            for term in terms {
                if seen.insert(term.clone()) {
                    *document_frequency.entry(term.clone()).or_default() += 1;
                }
                *term_frequency.entry(term).or_default() += 1;
            }
        }

        let max_doc_count = self.config.max_df * n as f32;
        let mut kept: Vec<(String, usize)> = document_frequency
            .into_iter()
            .filter(|(_, df)| *df >= self.config.min_df && *df as f32 <= max_doc_count)
            .collect();

        if n > 0 && kept.is_empty() {
            return Err(VectorError::InvalidDimension {
                dimension: 0,
                reason: "After pruning, no terms remain. Lower tfidf.min_df or raise tfidf.max_df",
            });
        }

        if kept.len() > self.config.max_features {
            kept.sort_by(|(a, _), (b, _)| {
                term_frequency[b]
                    .cmp(&term_frequency[a])
                    .then_with(|| a.cmp(b))
            });
            kept.truncate(self.config.max_features);
        }
        kept.sort_by(|(a, _), (b, _)| a.cmp(b));

        let idf = kept
            .iter()
            .map(|(_, df)| ((1.0 + n as f32) / (1.0 + *df as f32)).ln() + 1.0)
            .collect();
        let vocabulary: Vec<String> = kept.into_iter().map(|(term, _)| term).collect();
        let columns = vocabulary
            .iter()
            .enumerate()
            .map(|(i, term)| (term.clone(), i))
            .collect();

        tracing::debug!(
            documents = n,
            terms = vocabulary.len(),
            "fitted tf-idf vocabulary"
        );

        self.fitted = Some(Fitted {
            vocabulary,
            columns,
            idf,
            document_count: n,
        });
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        let fitted = self.fitted()?;
        Ok(texts.iter().map(|t| self.encode(fitted, t)).collect())
    }

    fn dimension(&self) -> Option<VectorDimension> {
        self.fitted
            .as_ref()
            .and_then(|f| VectorDimension::new(f.vocabulary.len()).ok())
    }

    fn state(&self) -> StrategyState {
        let (vocabulary, idf, document_count) = match &self.fitted {
            Some(f) => (f.vocabulary.clone(), f.idf.clone(), f.document_count),
            None => (Vec::new(), Vec::new(), 0),
        };
        StrategyState::TfIdf(TfIdfState {
            config: self.config.clone(),
            vocabulary,
            idf,
            document_count,
        })
    }
}
