//! Exact k-nearest-neighbor index over segment embeddings.
//!
//! A [`VectorIndex`] is built once from parallel sequences of segments and
//! vectors and never mutated afterwards; a new document means a new build.
//! Search is brute force over every stored vector, which is plenty for the
//! few hundred segments a single uploaded document produces.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::Serialize;

use crate::embedding::{cosine_similarity, l2_distance};
use crate::error::{AssistantError, Result};
use crate::models::TextSegment;

/// How closeness between two vectors is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Cosine similarity; higher scores are closer.
    #[default]
    Cosine,
    /// Euclidean distance; lower scores are closer.
    L2,
}

impl DistanceMetric {
    fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => cosine_similarity(a, b),
            DistanceMetric::L2 => l2_distance(a, b),
        }
    }

    /// Orders `a` before `b` when `a` is closer.
    fn closer(&self, a: f32, b: f32) -> Ordering {
        let ord = match self {
            DistanceMetric::Cosine => b.partial_cmp(&a),
            DistanceMetric::L2 => a.partial_cmp(&b),
        };
        ord.unwrap_or(Ordering::Equal)
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "l2" | "euclidean" => Ok(DistanceMetric::L2),
            other => Err(format!(
                "unknown distance metric '{}'. Use cosine or l2.",
                other
            )),
        }
    }
}

/// A segment returned from [`VectorIndex::query`] with its score.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit<'a> {
    pub segment: &'a TextSegment,
    /// Similarity (cosine) or distance (L2), depending on the index metric.
    pub score: f32,
}

struct Entry {
    segment: TextSegment,
    vector: Vec<f32>,
}

/// Immutable mapping from embeddings to the segments they came from.
pub struct VectorIndex {
    entries: Vec<Entry>,
    dims: usize,
    metric: DistanceMetric,
}

impl VectorIndex {
    /// Build an index from parallel sequences.
    ///
    /// Fails with [`AssistantError::LengthMismatch`] when the sequences
    /// differ in length and with [`AssistantError::DimensionMismatch`] when
    /// the vectors do not all share one dimensionality. Nothing is built on
    /// failure.
    pub fn build(
        segments: Vec<TextSegment>,
        vectors: Vec<Vec<f32>>,
        metric: DistanceMetric,
    ) -> Result<Self> {
        if segments.len() != vectors.len() {
            return Err(AssistantError::LengthMismatch {
                segments: segments.len(),
                vectors: vectors.len(),
            });
        }

        let dims = vectors.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            return Err(AssistantError::DimensionMismatch {
                expected: dims,
                actual: bad.len(),
            });
        }

        let entries = segments
            .into_iter()
            .zip(vectors)
            .map(|(segment, vector)| Entry { segment, vector })
            .collect();

        Ok(Self {
            entries,
            dims,
            metric,
        })
    }

    /// Return up to `k` segments ordered from closest to farthest.
    ///
    /// When `k` exceeds the number of indexed segments every segment is
    /// returned. Equal scores keep original segment order.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<SearchHit<'_>>> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if vector.len() != self.dims {
            return Err(AssistantError::DimensionMismatch {
                expected: self.dims,
                actual: vector.len(),
            });
        }

        let mut hits: Vec<SearchHit<'_>> = self
            .entries
            .iter()
            .map(|e| SearchHit {
                segment: &e.segment,
                score: self.metric.score(vector, &e.vector),
            })
            .collect();

        // `sort_by` is stable, so ties stay in segment order.
        hits.sort_by(|a, b| self.metric.closer(a.score, b.score));
        hits.truncate(k);
        Ok(hits)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Segments in their original order.
    pub fn segments(&self) -> impl Iterator<Item = &TextSegment> {
        self.entries.iter().map(|e| &e.segment)
    }
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("segments", &self.entries.len())
            .field("dims", &self.dims)
            .field("metric", &self.metric)
            .finish()
    }
}
