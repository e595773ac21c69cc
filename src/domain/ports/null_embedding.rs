//! Null embedding provider implementation.
//!
//! Used offline and in tests: every text maps to the zero vector of the
//! configured dimension, so similarity ranking degrades to insertion order.

use async_trait::async_trait;

use super::embedding::EmbeddingProvider;
use crate::domain::errors::RagResult;

/// An embedding provider that never touches the network.
#[derive(Debug, Clone)]
pub struct NullEmbeddingProvider {
    dimension: usize,
}

impl NullEmbeddingProvider {
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingProvider for NullEmbeddingProvider {
    fn name(&self) -> &'static str {
        "null"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, _text: &str) -> RagResult<Vec<f32>> {
        Ok(vec![0.0; self.dimension])
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        Ok(vec![vec![0.0; self.dimension]; texts.len()])
    }

    fn max_batch_size(&self) -> usize {
        usize::MAX
    }
}
