use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::chunking::ChunkingConfig;
use super::filter::MetadataFilter;

/// Main configuration structure for ragcore
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Embedding backend configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Persistent vector store configuration
    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    /// Document chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Retrieval post-processing configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Email indexing limits
    #[serde(default)]
    pub email: EmailConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,

    /// Directory for log files; logs go only to the console when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Also write logs to stderr
    #[serde(default = "default_true")]
    pub enable_stdout: bool,

    #[serde(default)]
    pub rotation: RotationPolicy,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

fn default_log_level() -> String {
    "warn".to_string()
}

const fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_dir: None,
            enable_stdout: true,
            rotation: RotationPolicy::default(),
        }
    }
}

/// Which embedding backend contract to speak
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// `POST {base}/embeddings` with `{model, input}`
    OpenAi,
    /// `POST {base}/embeddings` with `{model, content, prompt}`
    #[default]
    Native,
    /// Zero vectors, no network
    Null,
}

/// Vector served when the embedding backend cannot produce one
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FallbackVector {
    #[default]
    Zero,
    /// Deterministic pseudo-random unit vector derived from the text
    HashSeeded,
}

/// Embedding backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProviderKind,

    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// API key; falls back to the `OPENAI_API_KEY` environment variable for the
    /// OpenAI-compatible provider
    #[serde(default)]
    pub api_key: Option<String>,

    /// Texts per backend request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Sub-batches in flight at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Pause between waves of sub-batches
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First retry delay; doubles on every attempt
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Optional cap on outbound requests per second
    #[serde(default)]
    pub requests_per_second: Option<u32>,

    #[serde(default)]
    pub fallback: FallbackVector,
}

fn default_embedding_base_url() -> String {
    "http://localhost:11434/api".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

const fn default_batch_size() -> usize {
    4
}

const fn default_max_concurrency() -> usize {
    2
}

const fn default_batch_delay_ms() -> u64 {
    100
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_retry_base_delay_ms() -> u64 {
    1000
}

const fn default_timeout_secs() -> u64 {
    30
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::default(),
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
            api_key: None,
            batch_size: default_batch_size(),
            max_concurrency: default_max_concurrency(),
            batch_delay_ms: default_batch_delay_ms(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            timeout_secs: default_timeout_secs(),
            requests_per_second: None,
            fallback: FallbackVector::default(),
        }
    }
}

/// Persistent backend behind the adaptive store
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreType {
    /// Chroma-compatible REST server
    #[default]
    Chroma,
    /// Local `SQLite` file
    Sqlite,
    /// In-memory only, nothing persisted
    Memory,
}

impl std::fmt::Display for VectorStoreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chroma => write!(f, "chroma"),
            Self::Sqlite => write!(f, "sqlite"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Vector store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VectorStoreConfig {
    #[serde(rename = "type", default)]
    pub store_type: VectorStoreType,

    /// Database file for the sqlite backend
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Server address for the chroma backend
    #[serde(default = "default_store_base_url")]
    pub base_url: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// Embedding dimension; every vector must have exactly this length
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[allow(clippy::unnecessary_wraps)]
fn default_store_base_url() -> Option<String> {
    Some("http://localhost:8000".to_string())
}

fn default_collection_name() -> String {
    "documents".to_string()
}

const fn default_dimension() -> usize {
    768
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            store_type: VectorStoreType::default(),
            path: None,
            base_url: default_store_base_url(),
            api_key: None,
            collection_name: default_collection_name(),
            dimension: default_dimension(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Retrieval post-processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetrievalConfig {
    /// Results returned after post-processing
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Hits scoring below this are dropped
    #[serde(default)]
    pub min_score: f32,

    /// Blend store scores with query-term coverage
    #[serde(default = "default_true")]
    pub reranking: bool,

    /// Weight of the redundancy penalty, 0 disables diversification
    #[serde(default)]
    pub diversity_factor: f32,

    /// Favour recently created or updated chunks
    #[serde(default)]
    pub boost_recent: bool,

    /// Filter applied to every search
    #[serde(default)]
    pub filters: Option<MetadataFilter>,
}

const fn default_top_k() -> usize {
    5
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: 0.0,
            reranking: true,
            diversity_factor: 0.0,
            boost_recent: false,
            filters: None,
        }
    }
}

/// Email indexing limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EmailConfig {
    /// Emails indexed per batch
    #[serde(default = "default_email_batch_size")]
    pub batch_size: usize,

    /// Body bytes kept per email
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Subject characters kept per email
    #[serde(default = "default_max_subject_chars")]
    pub max_subject_chars: usize,

    /// Recipients kept per address list
    #[serde(default = "default_max_recipients")]
    pub max_recipients: usize,
}

const fn default_email_batch_size() -> usize {
    25
}

const fn default_max_body_bytes() -> usize {
    10 * 1024
}

const fn default_max_subject_chars() -> usize {
    500
}

const fn default_max_recipients() -> usize {
    50
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            batch_size: default_email_batch_size(),
            max_body_bytes: default_max_body_bytes(),
            max_subject_chars: default_max_subject_chars(),
            max_recipients: default_max_recipients(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.vector_store.store_type, VectorStoreType::Chroma);
        assert_eq!(config.vector_store.base_url.as_deref(), Some("http://localhost:8000"));
        assert_eq!(config.embedding.batch_size, 4);
        assert_eq!(config.embedding.max_concurrency, 2);
        assert_eq!(config.embedding.batch_delay_ms, 100);
        assert_eq!(config.retrieval.top_k, 5);
        assert!(config.retrieval.reranking);
        assert_eq!(config.email.batch_size, 25);
        assert_eq!(config.email.max_body_bytes, 10_240);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r"
vector_store:
  type: sqlite
  path: /tmp/rag.db
retrieval:
  top_k: 8
  filters:
    category: manual
";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.vector_store.store_type, VectorStoreType::Sqlite);
        assert_eq!(config.vector_store.collection_name, "documents");
        assert_eq!(config.retrieval.top_k, 8);
        assert_eq!(config.retrieval.filters.unwrap().len(), 1);
        assert_eq!(config.logging.level, "warn");
    }
}
