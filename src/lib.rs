//! ragcore - Retrieval-augmented generation core
//!
//! ragcore chunks documents, embeds them, stores them in a vector backend and
//! retrieves the most relevant chunks for a query, formatted for inclusion in
//! a language-model prompt.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Document model, configuration, errors and ports
//! - **Adapter Layer** (`adapters`): Embedding providers, Chroma and SQLite stores
//! - **Infrastructure Layer** (`infrastructure`): Config loading, logging,
//!   chunking and the in-memory and adaptive stores
//! - **Service Layer** (`services`): Embedding orchestration, retrieval
//!   enhancement and the [`RagSystem`] façade
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use ragcore::{ConfigLoader, RagSystem};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load()?;
//!     let rag = RagSystem::from_config(&config)?;
//!     rag.add_document("Backups run nightly.", serde_json::Map::new()).await?;
//!     let context = rag.get_context_for_prompt("backups", &Default::default()).await?;
//!     println!("{context}");
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{RagError, RagResult};
pub use domain::models::{
    ChunkingConfig, ChunkingMethod, Config, Document, DocumentMetadata, EmailMessage,
    MetadataFilter, ProcessedDocument, QueryResult,
};
pub use domain::ports::{EmbeddingProvider, VectorStore};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::logging::LoggerImpl;
pub use infrastructure::vector::{AdaptiveVectorStore, DocumentProcessor, InMemoryVectorStore};
pub use services::{
    ContextFormat, ContextOptions, EmbeddingService, RagSystem, RetrievalService, TransferFormat,
};
