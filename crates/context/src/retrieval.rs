//! External services the compiler leans on for candidate-atom discovery,
//! injected the same way the transducers crate injects its LLM and
//! similarity services — the compiler never embeds its own notion of
//! "close enough."

use async_trait::async_trait;

use crate::atom::AtomStore;
use crate::error::Result;

/// One LLM call's worth of situational context, per §4.6's contract tuple.
#[derive(Clone, Debug)]
pub struct ContextQuery {
    pub shard_kind: String,
    pub task: String,
    pub intent: String,
    pub language: String,
    pub framework: String,
    pub phase: String,
    pub recent_history_digest: String,
}

impl ContextQuery {
    /// Flatten the tuple into the text handed to the embedding service.
    pub fn as_embedding_text(&self) -> String {
        format!(
            "{} | {} | {} | {} | {} | {} | {}",
            self.shard_kind, self.task, self.intent, self.language, self.framework, self.phase, self.recent_history_digest
        )
    }
}

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Deterministic stand-in: a fixed-width bag-of-words hash embedding. Not
/// semantically meaningful, but stable and dependency-free for tests and for
/// any deployment that hasn't wired a real embedding endpoint yet.
pub struct HashEmbeddingService {
    dims: usize,
}

impl HashEmbeddingService {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }
}

#[async_trait]
impl EmbeddingService for HashEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0f32; self.dims];
        for word in text.split_whitespace() {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            use std::hash::{Hash, Hasher};
            word.hash(&mut hasher);
            let slot = (hasher.finish() as usize) % self.dims;
            vector[slot] += 1.0;
        }
        Ok(vector)
    }
}

#[async_trait]
pub trait VectorRecall: Send + Sync {
    /// Return the `k` atom-ids whose embeddings are nearest `embedding`.
    async fn recall(&self, embedding: &[f32], k: usize) -> Result<Vec<String>>;
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Brute-force nearest-neighbor over an in-memory `AtomStore`. Fine at the
/// atom-store scale this system targets (hundreds, not millions, of atoms);
/// a real deployment can swap in an external vector index behind the same
/// trait without the compiler noticing.
pub struct AtomStoreRecall {
    store: AtomStore,
}

impl AtomStoreRecall {
    pub fn new(store: AtomStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl VectorRecall for AtomStoreRecall {
    async fn recall(&self, embedding: &[f32], k: usize) -> Result<Vec<String>> {
        let mut scored: Vec<(String, f32)> = self
            .store
            .all()
            .map(|a| (a.id.clone(), cosine_similarity(embedding, &a.embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scored.into_iter().take(k).map(|(id, _)| id).collect())
    }
}
