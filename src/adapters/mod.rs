//! Adapters for external systems: embedding backends and persistent vector stores.

pub mod chroma;
pub mod embeddings;
pub mod sqlite;
