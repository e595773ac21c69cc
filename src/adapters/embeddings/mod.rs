//! Embedding provider adapters.

pub mod native;
pub mod openai;

use std::sync::Arc;

pub use native::{NativeEmbeddingConfig, NativeEmbeddingProvider};
pub use openai::{OpenAiEmbeddingConfig, OpenAiEmbeddingProvider};

use crate::domain::errors::RagResult;
use crate::domain::models::{EmbeddingConfig, EmbeddingProviderKind};
use crate::domain::ports::{EmbeddingProvider, NullEmbeddingProvider};

/// Build the provider selected by `config`, producing vectors of `dimension`.
pub fn create_provider(
    config: &EmbeddingConfig,
    dimension: usize,
) -> RagResult<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider {
        EmbeddingProviderKind::OpenAi => Arc::new(OpenAiEmbeddingProvider::new(OpenAiEmbeddingConfig {
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            dimension,
            timeout_secs: config.timeout_secs,
            ..OpenAiEmbeddingConfig::default()
        })?),
        EmbeddingProviderKind::Native => Arc::new(NativeEmbeddingProvider::new(NativeEmbeddingConfig {
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            dimension,
            api_key: config.api_key.clone(),
            timeout_secs: config.timeout_secs,
        })?),
        EmbeddingProviderKind::Null => Arc::new(NullEmbeddingProvider::new(dimension)),
    };
    Ok(provider)
}
