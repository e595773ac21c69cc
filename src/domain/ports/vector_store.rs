//! Vector store port.
//!
//! Every backend (Chroma, `SQLite`, in-memory, and the adaptive wrapper that
//! switches between them) exposes the same capability set so the rest of the
//! system never needs to know which one is active.

use async_trait::async_trait;

use crate::domain::errors::RagResult;
use crate::domain::models::{Document, MetadataFilter, ProcessedDocument, QueryResult};

/// Storage and similarity search over document chunks.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend name used in logs and store info (e.g., "chroma", "memory").
    fn name(&self) -> &'static str;

    /// Prepare the backend (create collections/tables). Idempotent.
    async fn initialize(&self) -> RagResult<()>;

    /// Store chunks, replacing any with the same id. Returns the number stored.
    async fn add_documents(&self, documents: &[ProcessedDocument]) -> RagResult<usize>;

    /// Rank stored chunks against `query`, best first, at most `limit` results.
    async fn search(&self, query: &str, limit: usize) -> RagResult<Vec<QueryResult>>;

    /// Like [`Self::search`], keeping only chunks whose metadata matches `filter`.
    async fn search_with_filter(
        &self,
        query: &str,
        filter: &MetadataFilter,
        limit: usize,
    ) -> RagResult<Vec<QueryResult>>;

    /// Fetch a chunk by its id.
    async fn get_document(&self, id: &str) -> RagResult<Option<Document>>;

    /// Remove every chunk of a source document. Returns the number removed.
    async fn delete_by_source_id(&self, source_id: &str) -> RagResult<usize>;

    /// Page through stored chunks in a stable order.
    async fn get_all_documents(&self, limit: usize, offset: usize) -> RagResult<Vec<Document>>;

    /// Number of distinct source documents.
    async fn get_document_count(&self) -> RagResult<usize>;

    /// Number of stored chunks.
    async fn get_chunk_count(&self) -> RagResult<usize>;

    /// Names of the collections this backend holds.
    async fn get_collections(&self) -> RagResult<Vec<String>>;

    /// Remove everything.
    async fn clear(&self) -> RagResult<()>;
}
