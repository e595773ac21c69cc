//! Common test utilities for integration tests
//!
//! Stub embedding providers, stores that fail on demand, and builders for
//! small in-memory systems.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tempfile::TempDir;

use ragcore::domain::models::{
    Config, Document, EmbeddingProviderKind, MetadataFilter, ProcessedDocument, QueryResult,
    VectorStoreType,
};
use ragcore::domain::ports::{EmbeddingProvider, VectorStore};
use ragcore::services::{EmbeddingService, EmbeddingServiceConfig};
use ragcore::{InMemoryVectorStore, RagError, RagResult, RagSystem};

pub const TEST_DIMENSION: usize = 8;

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Setup test logging
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Turn a `json!({...})` literal into a metadata map
pub fn meta(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Config for a memory-backed system with zero-vector embeddings
pub fn memory_config() -> Config {
    let mut config = Config::default();
    config.vector_store.store_type = VectorStoreType::Memory;
    config.vector_store.dimension = TEST_DIMENSION;
    config.embedding.provider = EmbeddingProviderKind::Null;
    config
}

pub fn memory_system() -> RagSystem {
    RagSystem::from_config(&memory_config()).expect("memory system")
}

/// Deterministic bag-of-letters embeddings: texts sharing letters point the same way.
pub struct LetterEmbeddingProvider;

impl LetterEmbeddingProvider {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; TEST_DIMENSION];
        for c in text.to_lowercase().chars().filter(char::is_ascii_lowercase) {
            vector[(c as usize - 'a' as usize) % TEST_DIMENSION] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for LetterEmbeddingProvider {
    fn name(&self) -> &'static str {
        "letters"
    }

    fn dimension(&self) -> usize {
        TEST_DIMENSION
    }

    async fn embed(&self, text: &str) -> RagResult<Vec<f32>> {
        Ok(Self::vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn max_batch_size(&self) -> usize {
        4
    }
}

/// Provider whose backend is always down; counts the calls it receives.
#[derive(Default)]
pub struct DownEmbeddingProvider {
    pub calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for DownEmbeddingProvider {
    fn name(&self) -> &'static str {
        "down"
    }

    fn dimension(&self) -> usize {
        TEST_DIMENSION
    }

    async fn embed(&self, _text: &str) -> RagResult<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RagError::Embedding("connection refused".to_string()))
    }

    async fn embed_batch(&self, _texts: &[String]) -> RagResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RagError::Embedding("connection refused".to_string()))
    }

    fn max_batch_size(&self) -> usize {
        2
    }
}

pub fn embedding_service(provider: Arc<dyn EmbeddingProvider>) -> Arc<EmbeddingService> {
    let config = EmbeddingServiceConfig {
        dimension: TEST_DIMENSION,
        ..EmbeddingServiceConfig::default()
    };
    Arc::new(EmbeddingService::new(provider, config))
}

/// In-memory store that starts failing every call once `break_now` is called,
/// except for `get_all_documents`, so a failover can still migrate its content.
///
/// An optional write delay holds every `add_documents` call open long enough
/// for concurrent writers to overlap.
pub struct FlakyStore {
    inner: InMemoryVectorStore,
    broken: AtomicBool,
    write_delay: Option<Duration>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryVectorStore::new("flaky"),
            broken: AtomicBool::new(false),
            write_delay: None,
        }
    }

    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    pub fn break_now(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> RagResult<()> {
        if self.broken.load(Ordering::SeqCst) {
            Err(RagError::store("flaky", "connection reset by peer"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl VectorStore for FlakyStore {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn initialize(&self) -> RagResult<()> {
        self.check()?;
        self.inner.initialize().await
    }

    async fn add_documents(&self, documents: &[ProcessedDocument]) -> RagResult<usize> {
        self.check()?;
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.add_documents(documents).await
    }

    async fn search(&self, query: &str, limit: usize) -> RagResult<Vec<QueryResult>> {
        self.check()?;
        self.inner.search(query, limit).await
    }

    async fn search_with_filter(
        &self,
        query: &str,
        filter: &MetadataFilter,
        limit: usize,
    ) -> RagResult<Vec<QueryResult>> {
        self.check()?;
        self.inner.search_with_filter(query, filter, limit).await
    }

    async fn get_document(&self, id: &str) -> RagResult<Option<Document>> {
        self.check()?;
        self.inner.get_document(id).await
    }

    async fn delete_by_source_id(&self, source_id: &str) -> RagResult<usize> {
        self.check()?;
        self.inner.delete_by_source_id(source_id).await
    }

    async fn get_all_documents(&self, limit: usize, offset: usize) -> RagResult<Vec<Document>> {
        self.inner.get_all_documents(limit, offset).await
    }

    async fn get_document_count(&self) -> RagResult<usize> {
        self.check()?;
        self.inner.get_document_count().await
    }

    async fn get_chunk_count(&self) -> RagResult<usize> {
        self.check()?;
        self.inner.get_chunk_count().await
    }

    async fn get_collections(&self) -> RagResult<Vec<String>> {
        self.check()?;
        self.inner.get_collections().await
    }

    async fn clear(&self) -> RagResult<()> {
        self.check()?;
        self.inner.clear().await
    }
}

/// Store that fails every call, including reads used for migration.
pub struct DeadStore;

fn dead<T>() -> RagResult<T> {
    Err(RagError::store("dead", "connection refused"))
}

#[async_trait]
impl VectorStore for DeadStore {
    fn name(&self) -> &'static str {
        "dead"
    }

    async fn initialize(&self) -> RagResult<()> {
        dead()
    }

    async fn add_documents(&self, _: &[ProcessedDocument]) -> RagResult<usize> {
        dead()
    }

    async fn search(&self, _: &str, _: usize) -> RagResult<Vec<QueryResult>> {
        dead()
    }

    async fn search_with_filter(&self, _: &str, _: &MetadataFilter, _: usize) -> RagResult<Vec<QueryResult>> {
        dead()
    }

    async fn get_document(&self, _: &str) -> RagResult<Option<Document>> {
        dead()
    }

    async fn delete_by_source_id(&self, _: &str) -> RagResult<usize> {
        dead()
    }

    async fn get_all_documents(&self, _: usize, _: usize) -> RagResult<Vec<Document>> {
        dead()
    }

    async fn get_document_count(&self) -> RagResult<usize> {
        dead()
    }

    async fn get_chunk_count(&self) -> RagResult<usize> {
        dead()
    }

    async fn get_collections(&self) -> RagResult<Vec<String>> {
        dead()
    }

    async fn clear(&self) -> RagResult<()> {
        dead()
    }
}
