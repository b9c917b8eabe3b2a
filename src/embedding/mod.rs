//! Text embedding collaborators.
//!
//! The engine never talks to a model directly; it goes through the
//! [`Embedder`] trait. Two backends ship with the crate:
//! - [`HashingEmbedder`]: deterministic feature-hashing vectors (offline, tests)
//! - [`HttpEmbedder`]: OpenAI-compatible `/v1/embeddings` service
//!
//! [`EmbeddingCache`] is an explicit memo passed into the link generator.
//! It is keyed by a SHA-256 of model id and content and is safe to share
//! across concurrently analysed sessions.

mod client;
mod hashing;
mod types;

pub use client::HttpEmbedder;
pub use hashing::HashingEmbedder;
pub use types::{EmbeddingData, EmbeddingRequest, EmbeddingResponse};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::error::{EmbeddingError, EmbeddingResult};

/// Converts move text into a fixed-length vector.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>>;

    /// Dimensionality every returned vector must have.
    fn dimensions(&self) -> usize;

    /// Identifier of the model; part of the cache key.
    fn model_id(&self) -> String;
}

#[async_trait]
impl<E: Embedder + ?Sized> Embedder for Arc<E> {
    async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        (**self).embed(text).await
    }

    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    fn model_id(&self) -> String {
        (**self).model_id()
    }
}

type CacheKey = [u8; 32];

/// Hit/miss counters for an [`EmbeddingCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that required an embedding call.
    pub misses: u64,
    /// Stored vectors.
    pub entries: usize,
}

/// Shared, content-addressed embedding memo.
///
/// Cloning yields a handle to the same underlying map. Writes are idempotent:
/// the same model and text always map to the same key.
#[derive(Clone, Default)]
pub struct EmbeddingCache {
    entries: Arc<RwLock<HashMap<CacheKey, Arc<[f32]>>>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl EmbeddingCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    fn key(model_id: &str, content: &str) -> CacheKey {
        let mut hasher = Sha256::new();
        hasher.update(model_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(content.as_bytes());
        hasher.finalize().into()
    }

    /// Look up a vector, counting the hit or miss.
    pub async fn get(&self, model_id: &str, content: &str) -> Option<Arc<[f32]>> {
        let key = Self::key(model_id, content);
        let found = self.entries.read().await.get(&key).cloned();
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Store a vector for the given model and content.
    pub async fn insert(&self, model_id: &str, content: &str, vector: Arc<[f32]>) {
        let key = Self::key(model_id, content);
        self.entries.write().await.entry(key).or_insert(vector);
    }

    /// Number of stored vectors.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache holds no vectors.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Current counters.
    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len().await,
        }
    }
}

impl std::fmt::Debug for EmbeddingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingCache")
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Reject vectors of the wrong length, with non-finite entries, or zero norm.
pub fn validate_vector(move_id: &str, vector: &[f32], expected: usize) -> EmbeddingResult<()> {
    if vector.len() != expected {
        return Err(EmbeddingError::DimensionMismatch {
            move_id: move_id.to_string(),
            expected,
            actual: vector.len(),
        });
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(EmbeddingError::NonFinite {
            move_id: move_id.to_string(),
        });
    }
    if vector.iter().all(|v| *v == 0.0) {
        return Err(EmbeddingError::ZeroVector {
            move_id: move_id.to_string(),
        });
    }
    Ok(())
}

/// Cosine similarity of two equal-length vectors, accumulated in f64.
///
/// Returns 0.0 if either vector has zero norm or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
