use crate::Result;
use async_trait::async_trait;
use std::hash::{Hash, Hasher};

/// Seam for embedding computation.
///
/// The orchestration layer never calls a model directly; the scanner hands
/// block text to whichever provider the host wired in.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Width of the vectors this provider produces.
    fn dimension(&self) -> usize;

    /// Embed a batch of block texts, one vector per input, input order kept.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;
}

/// Deterministic feature-hashing embedder.
///
/// Tokenizes on non-alphanumeric boundaries and projects token counts into a
/// fixed-width vector via the hashing trick, L2-normalized. Runs offline with
/// no model weights, which makes it the default provider for local setups and
/// the reference provider in tests. Quality is far below a learned model;
/// hosts wanting real semantic recall plug in their own provider.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub const DEFAULT_DIMENSION: usize = 256;

    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_lowercase();
            // DefaultHasher with fixed keys keeps vectors stable across runs.
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            token.hash(&mut hasher);
            let h = hasher.finish();

            let slot = (h % self.dimension as u64) as usize;
            let sign = if h & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vector[slot] += sign;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}
