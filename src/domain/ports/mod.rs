//! Port trait definitions (Hexagonal Architecture)
//!
//! - EmbeddingProvider: turns text into dense vectors
//! - VectorStore: persists chunks and answers similarity queries
//!
//! Adapters in `crate::adapters` and `crate::infrastructure::vector` implement
//! these traits; services only ever see the trait objects.

pub mod embedding;
pub mod null_embedding;
pub mod vector_store;

pub use embedding::EmbeddingProvider;
pub use null_embedding::NullEmbeddingProvider;
pub use vector_store::VectorStore;
