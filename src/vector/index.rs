//! Exact brute-force vector index.
//!
//! The corpora this crate serves hold tens to a few thousand questions, so a
//! flat scan over a contiguous row-major buffer beats any approximate
//! structure on both latency and recall. Scoring runs in parallel with rayon.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::vector::{Position, Score, VectorDimension, VectorError};

/// Distance policy, fixed when the index is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Inner product of L2-normalized vectors.
    #[default]
    Cosine,
    /// Squared Euclidean distance `d`, reported as `1 / (1 + d)`.
    L2,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::L2 => "l2",
        }
    }

    /// Stable numeric tag used in the vector file header.
    pub(crate) fn to_tag(self) -> u32 {
        match self {
            Self::Cosine => 0,
            Self::L2 => 1,
        }
    }

    pub(crate) fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(Self::Cosine),
            1 => Some(Self::L2),
            _ => None,
        }
    }

    fn score(self, row: &[f32], query: &[f32]) -> f32 {
        match self {
            Self::Cosine => dot(row, query),
            Self::L2 => {
                let d = row
                    .iter()
                    .zip(query)
                    .fold(0.0f32, |acc, (a, b)| acc + (a - b) * (a - b));
                1.0 / (1.0 + d)
            }
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" | "ip" => Ok(Self::Cosine),
            "l2" | "euclidean" => Ok(Self::L2),
            other => Err(format!("Unknown metric '{other}'. Expected cosine or l2")),
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).fold(0.0f32, |acc, (x, y)| acc + x * y)
}

fn normalize_in_place(vector: &mut [f32]) {
    let norm = dot(vector, vector).sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

/// One query hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    pub position: Position,
    pub score: Score,
}

/// Ranking order: score descending, then position ascending.
fn rank_order(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}

/// Immutable flat index over a fixed set of vectors.
///
/// Row `i` is the vector at [`Position`] `i`. For [`DistanceMetric::Cosine`]
/// rows are stored normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    metric: DistanceMetric,
    dimension: Option<VectorDimension>,
    data: Vec<f32>,
    len: usize,
}

impl FlatIndex {
    /// Builds the index from the full corpus of vectors, in position order.
    ///
    /// # Errors
    /// Fails when vectors disagree on dimension, are zero-length, contain
    /// non-finite values, or there are more than `u32::MAX` of them.
    pub fn build(metric: DistanceMetric, vectors: Vec<Vec<f32>>) -> Result<Self, VectorError> {
        let len = vectors.len();
        if len > u32::MAX as usize {
            return Err(VectorError::TooManyVectors(len));
        }
        let Some(first) = vectors.first() else {
            return Ok(Self::empty(metric));
        };
        let dimension = VectorDimension::new(first.len())?;

        let mut data = Vec::with_capacity(len * dimension.get());
        for mut vector in vectors {
            dimension.validate_vector(&vector)?;
            check_finite(&vector)?;
            if metric == DistanceMetric::Cosine {
                normalize_in_place(&mut vector);
            }
            data.extend_from_slice(&vector);
        }

        tracing::debug!(
            vectors = len,
            dimension = dimension.get(),
            metric = %metric,
            "built flat index"
        );

        Ok(Self {
            metric,
            dimension: Some(dimension),
            data,
            len,
        })
    }

    /// Index with no vectors; every query returns an empty list.
    #[must_use]
    pub fn empty(metric: DistanceMetric) -> Self {
        Self {
            metric,
            dimension: None,
            data: Vec::new(),
            len: 0,
        }
    }

    /// Restores an index from stored rows without re-normalizing them.
    pub(crate) fn from_rows(
        metric: DistanceMetric,
        dimension: Option<VectorDimension>,
        data: Vec<f32>,
    ) -> Result<Self, VectorError> {
        let Some(dim) = dimension else {
            if !data.is_empty() {
                return Err(VectorError::InvalidFormat(
                    "vector data present without a dimension".to_string(),
                ));
            }
            return Ok(Self::empty(metric));
        };
        if data.len() % dim.get() != 0 {
            return Err(VectorError::InvalidFormat(format!(
                "{} values do not divide into rows of {}",
                data.len(),
                dim.get()
            )));
        }
        if let Some(bad) = data.iter().find(|v| !v.is_finite()) {
            return Err(VectorError::InvalidFormat(format!(
                "stored vector contains non-finite value {bad}"
            )));
        }
        let len = data.len() / dim.get();
        if len == 0 {
            return Ok(Self::empty(metric));
        }
        if len > u32::MAX as usize {
            return Err(VectorError::TooManyVectors(len));
        }
        Ok(Self {
            metric,
            dimension: Some(dim),
            data,
            len,
        })
    }

    /// Returns the `k` nearest vectors, best first.
    ///
    /// `k` is clamped to `[1, len]`; an empty index yields an empty list.
    /// Equal scores are ordered by ascending position.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>, VectorError> {
        let Some(dimension) = self.dimension else {
            return Ok(Vec::new());
        };
        dimension.validate_vector(vector)?;
        check_finite(vector)?;

        let mut query = vector.to_vec();
        if self.metric == DistanceMetric::Cosine {
            normalize_in_place(&mut query);
        }

        let k = k.clamp(1, self.len);
        let metric = self.metric;
        let mut scored: Vec<(usize, f32)> = self
            .data
            .par_chunks(dimension.get())
            .enumerate()
            .map(|(i, row)| (i, metric.score(row, &query)))
            .collect();

        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, rank_order);
            scored.truncate(k);
        }
        scored.sort_by(rank_order);

        scored
            .into_iter()
            .map(|(i, score)| {
                Ok(Neighbor {
                    // len <= u32::MAX is checked at construction
                    position: Position::new(i as u32),
                    score: Score::new(score)?,
                })
            })
            .collect()
    }

    /// Stored row at a position.
    #[must_use]
    pub fn vector(&self, position: Position) -> Option<&[f32]> {
        let dim = self.dimension?.get();
        let start = position.as_index().checked_mul(dim)?;
        self.data.get(start..start + dim)
    }

    /// All stored values, row-major.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn dimension(&self) -> Option<VectorDimension> {
        self.dimension
    }

    #[must_use]
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }
}

fn check_finite(values: &[f32]) -> Result<(), VectorError> {
    match values.iter().find(|v| !v.is_finite()) {
        Some(&value) => Err(VectorError::NonFiniteEmbedding { value }),
        None => Ok(()),
    }
}
