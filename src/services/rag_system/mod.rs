//! RAG system façade.
//!
//! The entry point callers use. It owns the collaborators and keeps the
//! ingestion and retrieval paths in one place:
//!
//! - **types**: Request options, reports and status snapshots
//! - **context**: Formatting retrieved chunks for a language-model prompt
//! - **email**: Email-specific indexing and search
//! - **locks**: Per-source serialization of replace-on-ingest writes
//! - **transfer**: JSON and CSV export/import

mod context;
mod email;
mod locks;
mod transfer;
pub mod types;

pub use types::{
    AddedDocument, ContextFormat, ContextOptions, ImportReport, NewDocument, RagStats,
    SystemHealth, TransferFormat,
};

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::chroma::{ChromaConfig, ChromaVectorStore};
use crate::adapters::embeddings::create_provider;
use crate::adapters::sqlite::SqliteVectorStore;
use crate::domain::errors::{RagError, RagResult};
use crate::domain::models::{
    Config, Document, DocumentMetadata, EmailConfig, MetadataFilter, ProcessedDocument,
    QueryResult, VectorStoreType,
};
use crate::domain::ports::VectorStore;
use crate::infrastructure::vector::{
    AdaptiveVectorStore, DocumentProcessor, HealthStatus, InMemoryVectorStore,
};
use crate::services::{EmbeddingService, EmbeddingServiceConfig, RetrievalService};

use self::locks::SourceLocks;

/// Retrieval-augmented generation system.
///
/// Every public operation initializes the system on first use. Backend
/// failures during initialization are logged, not returned: the adaptive store
/// has already switched to its fallback by then.
pub struct RagSystem {
    store: Arc<AdaptiveVectorStore>,
    embeddings: Arc<EmbeddingService>,
    processor: DocumentProcessor,
    retrieval: RetrievalService,
    email: EmailConfig,
    initialized: OnceCell<()>,
    source_locks: SourceLocks,
}

impl RagSystem {
    pub fn new(
        store: Arc<AdaptiveVectorStore>,
        embeddings: Arc<EmbeddingService>,
        processor: DocumentProcessor,
        retrieval: RetrievalService,
        email: EmailConfig,
    ) -> Self {
        Self {
            store,
            embeddings,
            processor,
            retrieval,
            email,
            initialized: OnceCell::new(),
            source_locks: SourceLocks::default(),
        }
    }

    /// Wire the default collaborators described by `config`.
    ///
    /// The configured backend becomes the primary store; an in-memory store is
    /// always the fallback.
    pub fn from_config(config: &Config) -> RagResult<Self> {
        let store_config = &config.vector_store;
        let dimension = store_config.dimension;

        let provider = create_provider(&config.embedding, dimension)?;
        let embeddings = Arc::new(EmbeddingService::new(
            provider,
            EmbeddingServiceConfig::from_config(&config.embedding, dimension),
        ));

        let collection = store_config.collection_name.clone();
        let primary: Arc<dyn VectorStore> = match store_config.store_type {
            VectorStoreType::Chroma => Arc::new(ChromaVectorStore::new(
                ChromaConfig::from_store_config(store_config)?,
                embeddings.clone(),
            )?),
            VectorStoreType::Sqlite => {
                let path = store_config.path.clone().ok_or_else(|| {
                    RagError::InvalidConfig("sqlite store requires vector_store.path".to_string())
                })?;
                Arc::new(SqliteVectorStore::open(path, embeddings.clone(), collection.clone()))
            }
            VectorStoreType::Memory => Arc::new(InMemoryVectorStore::new(collection.clone())),
        };
        let fallback: Arc<dyn VectorStore> = Arc::new(InMemoryVectorStore::new(collection));

        debug!(
            primary = primary.name(),
            provider = embeddings.provider_name(),
            dimension,
            "rag system wired"
        );

        Ok(Self::new(
            Arc::new(AdaptiveVectorStore::new(primary, fallback)),
            embeddings,
            DocumentProcessor::new(config.chunking.clone())?,
            RetrievalService::new(config.retrieval.clone()),
            config.email.clone(),
        ))
    }

    pub fn store(&self) -> &Arc<AdaptiveVectorStore> {
        &self.store
    }

    pub fn embedding_service(&self) -> &Arc<EmbeddingService> {
        &self.embeddings
    }

    pub const fn processor(&self) -> &DocumentProcessor {
        &self.processor
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.initialized()
    }

    /// Initialize the store once; concurrent callers wait for the same attempt.
    pub async fn initialize(&self) {
        self.initialized
            .get_or_init(|| async {
                match self.store.initialize().await {
                    Ok(()) => info!(backend = %self.store.get_store_info().active, "rag system initialized"),
                    Err(err) => warn!(error = %err, "rag system initialized without a working store"),
                }
            })
            .await;
    }

    /// Chunk and store one document, replacing any earlier version of its source.
    pub async fn add_document(
        &self,
        content: &str,
        metadata: Map<String, Value>,
    ) -> RagResult<AddedDocument> {
        self.initialize().await;

        let (source_id, chunks) = self.prepare(content, metadata);
        let chunk_ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
        if chunks.is_empty() {
            debug!(source_id = %source_id, "document has no content, nothing stored");
            return Ok(AddedDocument { source_id, chunk_ids });
        }

        let _guards = self.source_locks.acquire([source_id.as_str()]).await;
        self.store.delete_by_source_id(&source_id).await?;
        self.store.add_documents(&chunks).await?;

        info!(source_id = %source_id, chunks = chunks.len(), "document added");
        Ok(AddedDocument { source_id, chunk_ids })
    }

    /// Ingest several documents with one store write.
    ///
    /// When a source appears more than once, the last occurrence wins.
    pub async fn add_documents(&self, documents: Vec<NewDocument>) -> RagResult<Vec<AddedDocument>> {
        self.initialize().await;

        let mut added: Vec<AddedDocument> = Vec::with_capacity(documents.len());
        let mut chunks: Vec<ProcessedDocument> = Vec::new();

        for document in documents {
            let (source_id, document_chunks) = self.prepare(&document.content, document.metadata);
            added.retain(|a| a.source_id != source_id);
            chunks.retain(|c| c.metadata.source_id != source_id);

            added.push(AddedDocument {
                source_id,
                chunk_ids: document_chunks.iter().map(|c| c.id.clone()).collect(),
            });
            chunks.extend(document_chunks);
        }

        let replaced: Vec<&AddedDocument> = added.iter().filter(|a| !a.chunk_ids.is_empty()).collect();
        let _guards = self
            .source_locks
            .acquire(replaced.iter().map(|a| a.source_id.as_str()))
            .await;
        for document in &replaced {
            self.store.delete_by_source_id(&document.source_id).await?;
        }
        if !chunks.is_empty() {
            self.store.add_documents(&chunks).await?;
        }

        info!(documents = added.len(), chunks = chunks.len(), "documents added");
        Ok(added)
    }

    fn prepare(&self, content: &str, metadata: Map<String, Value>) -> (String, Vec<ProcessedDocument>) {
        let source_id = resolve_source_id(&metadata);
        let mut metadata = DocumentMetadata::from_map(source_id.clone(), metadata);
        if metadata.created_at.is_none() {
            metadata.created_at = Some(Utc::now());
        }

        let chunks = self.processor.process_document(content, &metadata);
        (source_id, chunks)
    }

    /// Search with the configured default filter, if any.
    pub async fn search(&self, query: &str, limit: usize) -> RagResult<Vec<QueryResult>> {
        match self.retrieval.config().filters.clone() {
            Some(filter) if !filter.is_empty() => self.search_with_filter(query, &filter, limit).await,
            _ => {
                self.initialize().await;
                if limit == 0 {
                    return Ok(Vec::new());
                }
                let raw = self.store.search(query, limit.saturating_mul(2)).await?;
                Ok(self.retrieval.enhance(query, raw, limit))
            }
        }
    }

    pub async fn search_with_filter(
        &self,
        query: &str,
        filter: &MetadataFilter,
        limit: usize,
    ) -> RagResult<Vec<QueryResult>> {
        self.initialize().await;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let raw = self.store.search_with_filter(query, filter, limit.saturating_mul(2)).await?;
        Ok(self.retrieval.enhance(query, raw, limit))
    }

    /// Fetch a chunk by id, or the first chunk of the source with that id.
    pub async fn get_document(&self, id: &str) -> RagResult<Option<Document>> {
        self.initialize().await;

        if let Some(document) = self.store.get_document(id).await? {
            return Ok(Some(document));
        }
        self.store
            .get_document(&ProcessedDocument::chunk_id(id, 0))
            .await
    }

    /// Remove every chunk of `source_id`, returning how many were removed.
    pub async fn delete_document(&self, source_id: &str) -> RagResult<usize> {
        self.initialize().await;

        let removed = self.store.delete_by_source_id(source_id).await?;
        info!(source_id, chunks = removed, "document deleted");
        Ok(removed)
    }

    pub async fn list_documents(&self, limit: usize, offset: usize) -> RagResult<Vec<Document>> {
        self.initialize().await;
        self.store.get_all_documents(limit, offset).await
    }

    pub async fn clear(&self) -> RagResult<()> {
        self.initialize().await;
        self.store.clear().await?;
        info!("all documents cleared");
        Ok(())
    }

    pub async fn get_stats(&self) -> RagResult<RagStats> {
        self.initialize().await;

        Ok(RagStats {
            documents: self.store.get_document_count().await?,
            chunks: self.store.get_chunk_count().await?,
            collections: self.store.get_collections().await?,
            store: self.store.get_store_info(),
            embedding: self.embeddings.stats(),
            chunking: self.processor.config().clone(),
        })
    }

    /// Probe the store and fold in embedding degradation.
    pub async fn health_check(&self) -> SystemHealth {
        self.initialize().await;

        let store = self.store.health_check().await;
        let embedding = self.embeddings.stats();
        let status = match store.status {
            HealthStatus::Healthy if embedding.is_degraded() => HealthStatus::Degraded,
            status => status,
        };

        SystemHealth {
            status,
            initialized: self.is_initialized(),
            store,
            embedding,
        }
    }

    pub(crate) const fn email_config(&self) -> &EmailConfig {
        &self.email
    }
}

/// Source id from the `sourceId` or `id` metadata keys, else a fresh UUID.
fn resolve_source_id(metadata: &Map<String, Value>) -> String {
    ["sourceId", "id"]
        .iter()
        .find_map(|key| match metadata.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}
