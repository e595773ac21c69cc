//! Native embedding server adapter.
//!
//! For self-hosted embedding servers (llama.cpp server, Ollama-style APIs) that
//! accept one text per request at `POST {base}/embeddings` with
//! `{model, content, prompt}` and answer either `{"embedding": [...]}` or
//! `[{"index": 0, "embedding": [...]}]`, where the embedding may be nested one
//! level deeper (`[[...]]`).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::{RagError, RagResult};
use crate::domain::ports::EmbeddingProvider;
use crate::infrastructure::logging::scrub_message;

#[derive(Debug, Clone)]
pub struct NativeEmbeddingConfig {
    pub base_url: String,
    pub model: String,
    pub dimension: usize,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for NativeEmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/api".to_string(),
            model: "nomic-embed-text".to_string(),
            dimension: 768,
            api_key: None,
            timeout_secs: 30,
        }
    }
}

pub struct NativeEmbeddingProvider {
    config: NativeEmbeddingConfig,
    client: reqwest::Client,
}

impl NativeEmbeddingProvider {
    pub fn new(config: NativeEmbeddingConfig) -> RagResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl EmbeddingProvider for NativeEmbeddingProvider {
    fn name(&self) -> &'static str {
        "native"
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn embed(&self, text: &str) -> RagResult<Vec<f32>> {
        let url = format!("{}/embeddings", self.config.base_url.trim_end_matches('/'));
        let mut request = self.client.post(&url).json(&NativeRequest {
            model: &self.config.model,
            content: text,
            prompt: text,
        });
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RagError::Embedding(scrub_message(&format!("embedding request failed: {e}"))))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::Embedding(scrub_message(&format!(
                "embedding server returned {status}: {body}"
            ))));
        }

        let parsed: NativeResponse = response
            .json()
            .await
            .map_err(|e| RagError::Embedding(format!("failed to parse embedding response: {e}")))?;

        parsed
            .into_vector()
            .ok_or_else(|| RagError::Embedding("embedding response contained no vector".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    fn max_batch_size(&self) -> usize {
        1
    }
}

#[derive(Debug, Serialize)]
struct NativeRequest<'a> {
    model: &'a str,
    content: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEmbedding {
    Flat(Vec<f32>),
    Nested(Vec<Vec<f32>>),
}

impl RawEmbedding {
    fn into_vector(self) -> Option<Vec<f32>> {
        match self {
            Self::Flat(v) => Some(v),
            Self::Nested(v) => v.into_iter().next(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IndexedEmbedding {
    #[serde(default)]
    index: usize,
    embedding: RawEmbedding,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NativeResponse {
    Single { embedding: RawEmbedding },
    Indexed(Vec<IndexedEmbedding>),
}

impl NativeResponse {
    fn into_vector(self) -> Option<Vec<f32>> {
        match self {
            Self::Single { embedding } => embedding.into_vector(),
            Self::Indexed(items) => items
                .into_iter()
                .min_by_key(|item| item.index)
                .and_then(|item| item.embedding.into_vector()),
        }
    }
}
