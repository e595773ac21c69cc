pub mod chunking;
pub mod config;
pub mod document;
pub mod email;
pub mod filter;

pub use chunking::{estimate_tokens, ChunkingConfig, ChunkingMethod};
pub use config::{
    Config, EmailConfig, EmbeddingConfig, EmbeddingProviderKind, FallbackVector, LogFormat,
    LoggingConfig, RetrievalConfig, RotationPolicy, VectorStoreConfig, VectorStoreType,
};
pub use document::{Document, DocumentMetadata, ProcessedDocument, QueryResult};
pub use email::{BatchIndexOptions, BatchIndexReport, EmailMessage, EmailSearchOptions};
pub use filter::{Condition, FilterOp, MetadataFilter};
