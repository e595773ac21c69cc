//! SQLite-backed vector store.
//!
//! One table holds every chunk keyed by `(collection, id)`. Embeddings are
//! stored as little-endian f32 blobs and compared in Rust with cosine
//! similarity; metadata is stored as JSON and filtered with [`MetadataFilter`].

use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::connection::create_pool;
use crate::domain::errors::{RagError, RagResult};
use crate::domain::models::{Document, DocumentMetadata, MetadataFilter, ProcessedDocument, QueryResult};
use crate::domain::ports::VectorStore;
use crate::services::EmbeddingService;

const CREATE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS rag_chunks (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    source_id TEXT NOT NULL,
    content TEXT NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}',
    embedding BLOB NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (collection, id)
)";

const CREATE_SOURCE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_rag_chunks_source ON rag_chunks (collection, source_id)";

/// Vector store persisted in a local `SQLite` database.
pub struct SqliteVectorStore {
    path: Option<PathBuf>,
    pool: OnceCell<SqlitePool>,
    embeddings: Arc<EmbeddingService>,
    collection: String,
}

impl SqliteVectorStore {
    /// Store backed by the file at `path`, opened on first use.
    pub fn open(path: impl Into<PathBuf>, embeddings: Arc<EmbeddingService>, collection: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            pool: OnceCell::new(),
            embeddings,
            collection: collection.into(),
        }
    }

    /// Store using an existing pool.
    pub fn with_pool(pool: SqlitePool, embeddings: Arc<EmbeddingService>, collection: impl Into<String>) -> Self {
        Self {
            path: None,
            pool: OnceCell::from(pool),
            embeddings,
            collection: collection.into(),
        }
    }

    async fn pool(&self) -> RagResult<&SqlitePool> {
        self.pool
            .get_or_try_init(|| async {
                let path = self
                    .path
                    .as_deref()
                    .ok_or_else(|| RagError::InvalidConfig("sqlite store has no database path".to_string()))?;
                Ok::<_, RagError>(create_pool(path, None).await?)
            })
            .await
    }

    /// Fetch `(document, embedding)` pairs for the collection in insertion order.
    async fn load_embedded(&self) -> RagResult<Vec<(Document, Vec<f32>)>> {
        let rows = sqlx::query(
            "SELECT id, content, metadata, embedding FROM rag_chunks WHERE collection = ? ORDER BY rowid",
        )
        .bind(&self.collection)
        .fetch_all(self.pool().await?)
        .await?;

        rows.iter()
            .map(|row| -> RagResult<(Document, Vec<f32>)> {
                let bytes: Vec<u8> = row.try_get("embedding")?;
                Ok((row_to_document(row)?, bytes_to_embedding(&bytes)?))
            })
            .collect()
    }

    async fn rank(
        &self,
        query: &str,
        filter: Option<&MetadataFilter>,
        limit: usize,
    ) -> RagResult<Vec<QueryResult>> {
        let query_vector = self.embeddings.embed(query).await?;

        let mut results: Vec<QueryResult> = self
            .load_embedded()
            .await?
            .into_iter()
            .filter(|(document, _)| filter.is_none_or(|f| f.matches(&document.metadata)))
            .map(|(document, vector)| {
                let score = EmbeddingService::cosine_similarity(&query_vector, &vector).unwrap_or(0.0);
                QueryResult::new(document, score)
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        results.truncate(limit);
        Ok(results)
    }
}

fn row_to_document(row: &SqliteRow) -> RagResult<Document> {
    let id: String = row.try_get("id")?;
    let content: String = row.try_get("content")?;
    let metadata_json: String = row.try_get("metadata")?;
    let metadata: DocumentMetadata = serde_json::from_str(&metadata_json)?;
    Ok(Document::new(id, content, metadata))
}

/// Serialize embedding vector to bytes for storage
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize embedding vector from bytes
fn bytes_to_embedding(bytes: &[u8]) -> RagResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(RagError::store("sqlite", "invalid embedding blob length"));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn initialize(&self) -> RagResult<()> {
        let pool = self.pool().await?;
        sqlx::query(CREATE_TABLE).execute(pool).await?;
        sqlx::query(CREATE_SOURCE_INDEX).execute(pool).await?;
        info!(collection = %self.collection, backend = "sqlite", "vector store initialized");
        Ok(())
    }

    async fn add_documents(&self, documents: &[ProcessedDocument]) -> RagResult<usize> {
        if documents.is_empty() {
            return Ok(0);
        }

        let missing: Vec<String> = documents
            .iter()
            .filter(|d| d.embedding.is_none())
            .map(|d| d.content.clone())
            .collect();
        let mut computed = self.embeddings.embed_batch(&missing).await?.into_iter();

        let pool = self.pool().await?;
        let mut tx = pool.begin().await?;
        let now = Utc::now().to_rfc3339();

        for document in documents {
            let embedding = match &document.embedding {
                Some(embedding) => embedding.clone(),
                None => computed
                    .next()
                    .ok_or_else(|| RagError::Embedding("missing computed embedding".to_string()))?,
            };
            let metadata = serde_json::to_string(&document.metadata)?;

            sqlx::query(
                r"INSERT INTO rag_chunks (collection, id, source_id, content, metadata, embedding, created_at)
                  VALUES (?, ?, ?, ?, ?, ?, ?)
                  ON CONFLICT (collection, id) DO UPDATE SET
                      source_id = excluded.source_id,
                      content = excluded.content,
                      metadata = excluded.metadata,
                      embedding = excluded.embedding",
            )
            .bind(&self.collection)
            .bind(&document.id)
            .bind(&document.metadata.source_id)
            .bind(&document.content)
            .bind(metadata)
            .bind(embedding_to_bytes(&embedding))
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(chunks = documents.len(), backend = "sqlite", "documents added");
        Ok(documents.len())
    }

    async fn search(&self, query: &str, limit: usize) -> RagResult<Vec<QueryResult>> {
        self.rank(query, None, limit).await
    }

    async fn search_with_filter(
        &self,
        query: &str,
        filter: &MetadataFilter,
        limit: usize,
    ) -> RagResult<Vec<QueryResult>> {
        self.rank(query, Some(filter), limit).await
    }

    async fn get_document(&self, id: &str) -> RagResult<Option<Document>> {
        let row = sqlx::query("SELECT id, content, metadata FROM rag_chunks WHERE collection = ? AND id = ?")
            .bind(&self.collection)
            .bind(id)
            .fetch_optional(self.pool().await?)
            .await?;

        row.as_ref().map(row_to_document).transpose()
    }

    async fn delete_by_source_id(&self, source_id: &str) -> RagResult<usize> {
        let result = sqlx::query("DELETE FROM rag_chunks WHERE collection = ? AND source_id = ?")
            .bind(&self.collection)
            .bind(source_id)
            .execute(self.pool().await?)
            .await?;

        let removed = usize::try_from(result.rows_affected()).unwrap_or(usize::MAX);
        debug!(source_id, chunks = removed, backend = "sqlite", "source deleted");
        Ok(removed)
    }

    async fn get_all_documents(&self, limit: usize, offset: usize) -> RagResult<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT id, content, metadata FROM rag_chunks WHERE collection = ? ORDER BY rowid LIMIT ? OFFSET ?",
        )
        .bind(&self.collection)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .bind(i64::try_from(offset).unwrap_or(i64::MAX))
        .fetch_all(self.pool().await?)
        .await?;

        rows.iter().map(row_to_document).collect()
    }

    async fn get_document_count(&self) -> RagResult<usize> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(DISTINCT source_id) FROM rag_chunks WHERE collection = ?")
                .bind(&self.collection)
                .fetch_one(self.pool().await?)
                .await?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    async fn get_chunk_count(&self) -> RagResult<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rag_chunks WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(self.pool().await?)
            .await?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    async fn get_collections(&self) -> RagResult<Vec<String>> {
        let mut collections: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT collection FROM rag_chunks ORDER BY collection")
                .fetch_all(self.pool().await?)
                .await?;
        if !collections.contains(&self.collection) {
            collections.push(self.collection.clone());
        }
        Ok(collections)
    }

    async fn clear(&self) -> RagResult<()> {
        sqlx::query("DELETE FROM rag_chunks WHERE collection = ?")
            .bind(&self.collection)
            .execute(self.pool().await?)
            .await?;
        Ok(())
    }
}
