//! Embedder trait and vector utilities.
//!
//! Defines the [`Embedder`] trait every embedding backend implements,
//! the similarity/distance helpers used by the vector index, and
//! [`HashEmbedder`], a dependency-free deterministic embedder.
//!
//! Model-backed implementations (fastembed, Ollama, OpenAI) live in the
//! `ragdesk` app crate.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::{AssistantError, Result};

/// Maps text to fixed-dimension vectors.
///
/// Implementations must be deterministic for a fixed model version: the
/// same text always yields the same vector. Batching is an internal
/// concern; callers may pass any number of texts.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input, in order.
    ///
    /// Fails with [`AssistantError::Unavailable`] when the model cannot be
    /// loaded or reached.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AssistantError::unavailable(self.model_name(), "empty embedding response"))
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors, zero vectors, or vectors of different
/// lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Euclidean distance between two vectors of equal length.
///
/// Returns `f32::INFINITY` when the lengths differ.
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Scale a vector to unit length in place. Zero vectors are left untouched.
pub fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Feature-hashing bag-of-words embedder.
///
/// Each lowercase alphanumeric token is hashed with SHA-256 into one of
/// `dims` buckets with a sign bit, and the result is L2-normalized. No
/// model download and no network; texts sharing vocabulary land close
/// together. Good enough for offline use and tests, far from a
/// sentence-embedding model.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dims: usize,
    name: String,
}

pub const DEFAULT_HASH_DIMS: usize = 256;

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        let dims = dims.max(1);
        Self {
            dims,
            name: format!("hash-{}", dims),
        }
    }

    /// Synchronous embedding of one text.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dims as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }
        normalize(&mut v);
        v
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_DIMS)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_empty_and_mismatched() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_l2_distance() {
        assert_eq!(l2_distance(&[0.0, 0.0], &[3.0, 4.0]), 5.0);
        assert_eq!(l2_distance(&[1.0], &[1.0, 2.0]), f32::INFINITY);
    }

    #[test]
    fn test_hash_embedder_is_deterministic() {
        let e = HashEmbedder::default();
        let a = e.embed_text("The quick brown fox");
        let b = e.embed_text("The quick brown fox");
        assert_eq!(a, b);
        assert_eq!(a.len(), DEFAULT_HASH_DIMS);
    }

    #[test]
    fn test_hash_embedder_unit_length() {
        let v = HashEmbedder::new(64).embed_text("rust ownership and borrowing");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hash_embedder_empty_text_is_zero() {
        let v = HashEmbedder::new(16).embed_text("  ... ");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_hash_embedder_prefers_shared_vocabulary() {
        let e = HashEmbedder::default();
        let q = e.embed_text("invoice payment terms");
        let near = e.embed_text("The payment terms of this invoice are net 30.");
        let far = e.embed_text("Kubernetes schedules pods onto nodes.");
        assert!(cosine_similarity(&q, &near) > cosine_similarity(&q, &far));
    }

    #[tokio::test]
    async fn test_embed_one_matches_batch() {
        let e = HashEmbedder::default();
        let one = e.embed_one("hello world").await.unwrap();
        let batch = e.embed(&["hello world".to_string()]).await.unwrap();
        assert_eq!(one, batch[0]);
        assert_eq!(e.model_name(), "hash-256");
    }
}
