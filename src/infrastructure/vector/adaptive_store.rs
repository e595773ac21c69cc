//! Adaptive vector store with sticky failover.
//!
//! Wraps a persistent primary store. The first operational error from the
//! primary switches every subsequent call to the in-memory fallback, after
//! copying whatever the primary can still list. The switch happens once per
//! process; there is no automatic return to the primary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::{OnceCell, RwLock};
use tracing::{error, info, warn};

use crate::domain::errors::{RagError, RagResult};
use crate::domain::models::{Document, MetadataFilter, ProcessedDocument, QueryResult};
use crate::domain::ports::VectorStore;

/// Documents copied from the primary when failing over
pub const MIGRATION_LIMIT: usize = 10_000;

/// Which backend is serving requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreMode {
    /// The persistent backend is active.
    Primary,
    /// The primary failed; the in-memory backend is active.
    Fallback,
}

impl StoreMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
        }
    }
}

/// What happened when the store failed over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverRecord {
    /// Operation that hit the error
    pub operation: String,
    pub reason: String,
    pub failed_over_at: DateTime<Utc>,
    /// Documents copied into the fallback
    pub migrated: usize,
}

/// Snapshot of the adaptive store's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreInfo {
    pub mode: StoreMode,
    /// Name of the backend serving requests
    pub active: String,
    pub primary: String,
    pub fallback: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failover: Option<FailoverRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    /// Working, but on the non-primary backend
    Degraded,
    Error,
}

impl HealthStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Two-state (primary → fallback) vector store.
///
/// Primary calls run under a shared `gate`; the failover takes it exclusively
/// before reading the migration snapshot, so no primary write can land after
/// the snapshot and be lost.
pub struct AdaptiveVectorStore {
    primary: Arc<dyn VectorStore>,
    fallback: Arc<dyn VectorStore>,
    fallback_mode: AtomicBool,
    gate: RwLock<()>,
    failover: OnceCell<FailoverRecord>,
}

impl AdaptiveVectorStore {
    pub fn new(primary: Arc<dyn VectorStore>, fallback: Arc<dyn VectorStore>) -> Self {
        Self {
            primary,
            fallback,
            fallback_mode: AtomicBool::new(false),
            gate: RwLock::new(()),
            failover: OnceCell::new(),
        }
    }

    pub fn is_fallback_mode(&self) -> bool {
        self.fallback_mode.load(Ordering::Acquire)
    }

    pub fn mode(&self) -> StoreMode {
        if self.is_fallback_mode() {
            StoreMode::Fallback
        } else {
            StoreMode::Primary
        }
    }

    fn active(&self) -> Arc<dyn VectorStore> {
        if self.is_fallback_mode() {
            self.fallback.clone()
        } else {
            self.primary.clone()
        }
    }

    pub fn get_store_info(&self) -> StoreInfo {
        StoreInfo {
            mode: self.mode(),
            active: self.active().name().to_string(),
            primary: self.primary.name().to_string(),
            fallback: self.fallback.name().to_string(),
            failover: self.failover.get().cloned(),
        }
    }

    /// Probe the active backend by listing one document. Never triggers failover.
    pub async fn health_check(&self) -> HealthReport {
        let active = self.active();
        match active.get_all_documents(1, 0).await {
            Ok(_) if self.is_fallback_mode() => HealthReport {
                status: HealthStatus::Degraded,
                backend: active.name().to_string(),
                message: self.failover.get().map(|f| f.reason.clone()),
            },
            Ok(_) => HealthReport {
                status: HealthStatus::Healthy,
                backend: active.name().to_string(),
                message: None,
            },
            Err(err) => HealthReport {
                status: HealthStatus::Error,
                backend: active.name().to_string(),
                message: Some(err.to_string()),
            },
        }
    }

    /// Switch to the fallback, migrating what the primary still returns.
    ///
    /// Concurrent callers share one transition.
    async fn fail_over(&self, operation: &'static str, err: &RagError) {
        self.failover
            .get_or_init(|| async {
                let _gate = self.gate.write().await;
                warn!(
                    operation,
                    backend = self.primary.name(),
                    error = %err,
                    "primary vector store failed, switching to fallback"
                );

                if let Err(init_err) = self.fallback.initialize().await {
                    error!(backend = self.fallback.name(), error = %init_err, "fallback initialization failed");
                }

                let migrated = self.migrate().await;
                self.fallback_mode.store(true, Ordering::Release);

                info!(migrated, backend = self.fallback.name(), "failover complete");

                FailoverRecord {
                    operation: operation.to_string(),
                    reason: err.to_string(),
                    failed_over_at: Utc::now(),
                    migrated,
                }
            })
            .await;
    }

    async fn migrate(&self) -> usize {
        let documents = match self.primary.get_all_documents(MIGRATION_LIMIT, 0).await {
            Ok(documents) => documents,
            Err(err) => {
                warn!(error = %err, "could not read documents from primary, starting fallback empty");
                return 0;
            }
        };

        if documents.is_empty() {
            return 0;
        }

        let processed: Vec<ProcessedDocument> =
            documents.into_iter().map(ProcessedDocument::from).collect();
        match self.fallback.add_documents(&processed).await {
            Ok(count) => count,
            Err(err) => {
                warn!(error = %err, "migrating documents into fallback failed");
                0
            }
        }
    }

    /// Route a call to the active store, failing over on a primary error.
    async fn dispatch<'f, T, F>(&self, operation: &'static str, call: F) -> RagResult<T>
    where
        T: Send,
        F: Fn(Arc<dyn VectorStore>) -> BoxFuture<'f, RagResult<T>> + Send + Sync,
    {
        if !self.is_fallback_mode() {
            let gate = self.gate.read().await;
            // A failover may have completed while this call waited on the gate
            if !self.is_fallback_mode() {
                let result = call(self.primary.clone()).await;
                drop(gate);
                match result {
                    Ok(value) => return Ok(value),
                    Err(err) => self.fail_over(operation, &err).await,
                }
            }
        }

        call(self.fallback.clone()).await
    }
}

#[async_trait]
impl VectorStore for AdaptiveVectorStore {
    fn name(&self) -> &'static str {
        "adaptive"
    }

    async fn initialize(&self) -> RagResult<()> {
        self.dispatch("initialize", |store| Box::pin(async move { store.initialize().await }))
            .await
    }

    async fn add_documents(&self, documents: &[ProcessedDocument]) -> RagResult<usize> {
        self.dispatch("add_documents", |store| {
            Box::pin(async move { store.add_documents(documents).await })
        })
        .await
    }

    async fn search(&self, query: &str, limit: usize) -> RagResult<Vec<QueryResult>> {
        self.dispatch("search", |store| {
            Box::pin(async move { store.search(query, limit).await })
        })
        .await
    }

    async fn search_with_filter(
        &self,
        query: &str,
        filter: &MetadataFilter,
        limit: usize,
    ) -> RagResult<Vec<QueryResult>> {
        self.dispatch("search_with_filter", |store| {
            Box::pin(async move { store.search_with_filter(query, filter, limit).await })
        })
        .await
    }

    async fn get_document(&self, id: &str) -> RagResult<Option<Document>> {
        self.dispatch("get_document", |store| {
            Box::pin(async move { store.get_document(id).await })
        })
        .await
    }

    async fn delete_by_source_id(&self, source_id: &str) -> RagResult<usize> {
        self.dispatch("delete_by_source_id", |store| {
            Box::pin(async move { store.delete_by_source_id(source_id).await })
        })
        .await
    }

    async fn get_all_documents(&self, limit: usize, offset: usize) -> RagResult<Vec<Document>> {
        self.dispatch("get_all_documents", |store| {
            Box::pin(async move { store.get_all_documents(limit, offset).await })
        })
        .await
    }

    async fn get_document_count(&self) -> RagResult<usize> {
        self.dispatch("get_document_count", |store| {
            Box::pin(async move { store.get_document_count().await })
        })
        .await
    }

    async fn get_chunk_count(&self) -> RagResult<usize> {
        self.dispatch("get_chunk_count", |store| {
            Box::pin(async move { store.get_chunk_count().await })
        })
        .await
    }

    async fn get_collections(&self) -> RagResult<Vec<String>> {
        self.dispatch("get_collections", |store| {
            Box::pin(async move { store.get_collections().await })
        })
        .await
    }

    async fn clear(&self) -> RagResult<()> {
        self.dispatch("clear", |store| Box::pin(async move { store.clear().await }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::time::Duration;

    use super::*;
    use crate::domain::models::DocumentMetadata;
    use crate::infrastructure::vector::InMemoryVectorStore;

    /// Primary that fails every call
    #[derive(Default)]
    struct BrokenStore {
        listings: AtomicUsize,
    }

    #[async_trait]
    impl VectorStore for BrokenStore {
        fn name(&self) -> &'static str {
            "broken"
        }
        async fn initialize(&self) -> RagResult<()> {
            Err(RagError::store("broken", "connection refused"))
        }
        async fn add_documents(&self, _: &[ProcessedDocument]) -> RagResult<usize> {
            Err(RagError::store("broken", "connection refused"))
        }
        async fn search(&self, _: &str, _: usize) -> RagResult<Vec<QueryResult>> {
            Err(RagError::store("broken", "connection refused"))
        }
        async fn search_with_filter(
            &self,
            _: &str,
            _: &MetadataFilter,
            _: usize,
        ) -> RagResult<Vec<QueryResult>> {
            Err(RagError::store("broken", "connection refused"))
        }
        async fn get_document(&self, _: &str) -> RagResult<Option<Document>> {
            Err(RagError::store("broken", "connection refused"))
        }
        async fn delete_by_source_id(&self, _: &str) -> RagResult<usize> {
            Err(RagError::store("broken", "connection refused"))
        }
        async fn get_all_documents(&self, _: usize, _: usize) -> RagResult<Vec<Document>> {
            self.listings.fetch_add(1, AtomicOrdering::SeqCst);
            Err(RagError::store("broken", "connection refused"))
        }
        async fn get_document_count(&self) -> RagResult<usize> {
            Err(RagError::store("broken", "connection refused"))
        }
        async fn get_chunk_count(&self) -> RagResult<usize> {
            Err(RagError::store("broken", "connection refused"))
        }
        async fn get_collections(&self) -> RagResult<Vec<String>> {
            Err(RagError::store("broken", "connection refused"))
        }
        async fn clear(&self) -> RagResult<()> {
            Err(RagError::store("broken", "connection refused"))
        }
    }

    fn chunk(id: &str, content: &str) -> ProcessedDocument {
        ProcessedDocument::new(id.to_string(), content.to_string(), DocumentMetadata::new("src"))
    }

    #[tokio::test]
    async fn test_healthy_primary_stays_primary() {
        let store = AdaptiveVectorStore::new(
            Arc::new(InMemoryVectorStore::new("primary")),
            Arc::new(InMemoryVectorStore::new("fallback")),
        );
        store.initialize().await.unwrap();
        store.add_documents(&[chunk("a", "hello world")]).await.unwrap();

        assert!(!store.is_fallback_mode());
        let health = store.health_check().await;
        assert_eq!(health.status, HealthStatus::Healthy);
        assert!(store.get_store_info().failover.is_none());
    }

    #[tokio::test]
    async fn test_failing_primary_switches_and_serves_from_fallback() {
        let store = AdaptiveVectorStore::new(Arc::new(BrokenStore::default()), Arc::new(InMemoryVectorStore::default()));

        assert!(store.initialize().await.is_ok());
        assert!(store.is_fallback_mode());

        store.add_documents(&[chunk("a", "failover works")]).await.unwrap();
        let results = store.search("failover", 5).await.unwrap();
        assert_eq!(results.len(), 1);

        let info = store.get_store_info();
        assert_eq!(info.mode, StoreMode::Fallback);
        assert_eq!(info.active, "memory");
        assert_eq!(info.primary, "broken");
        let failover = info.failover.unwrap();
        assert_eq!(failover.operation, "initialize");
        assert_eq!(failover.migrated, 0);

        assert_eq!(store.health_check().await.status, HealthStatus::Degraded);
    }

    #[tokio::test]
    async fn test_concurrent_failures_fail_over_once() {
        let primary = Arc::new(BrokenStore::default());
        let store = Arc::new(AdaptiveVectorStore::new(
            primary.clone(),
            Arc::new(InMemoryVectorStore::default()),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.search("anything", 3).await })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert!(store.is_fallback_mode());
        assert_eq!(store.get_store_info().failover.unwrap().operation, "search");
        assert_eq!(primary.listings.load(AtomicOrdering::SeqCst), 1);
    }

    /// Primary whose searches fail and whose listing stalls after taking its
    /// snapshot, leaving a window in which other calls are in flight.
    struct SlowListingStore {
        inner: InMemoryVectorStore,
    }

    #[async_trait]
    impl VectorStore for SlowListingStore {
        fn name(&self) -> &'static str {
            "slow"
        }
        async fn initialize(&self) -> RagResult<()> {
            Ok(())
        }
        async fn add_documents(&self, documents: &[ProcessedDocument]) -> RagResult<usize> {
            self.inner.add_documents(documents).await
        }
        async fn search(&self, _: &str, _: usize) -> RagResult<Vec<QueryResult>> {
            Err(RagError::store("slow", "query timed out"))
        }
        async fn search_with_filter(
            &self,
            _: &str,
            _: &MetadataFilter,
            _: usize,
        ) -> RagResult<Vec<QueryResult>> {
            Err(RagError::store("slow", "query timed out"))
        }
        async fn get_document(&self, id: &str) -> RagResult<Option<Document>> {
            self.inner.get_document(id).await
        }
        async fn delete_by_source_id(&self, source_id: &str) -> RagResult<usize> {
            self.inner.delete_by_source_id(source_id).await
        }
        async fn get_all_documents(&self, limit: usize, offset: usize) -> RagResult<Vec<Document>> {
            let snapshot = self.inner.get_all_documents(limit, offset).await;
            tokio::time::sleep(Duration::from_millis(200)).await;
            snapshot
        }
        async fn get_document_count(&self) -> RagResult<usize> {
            self.inner.get_document_count().await
        }
        async fn get_chunk_count(&self) -> RagResult<usize> {
            self.inner.get_chunk_count().await
        }
        async fn get_collections(&self) -> RagResult<Vec<String>> {
            self.inner.get_collections().await
        }
        async fn clear(&self) -> RagResult<()> {
            self.inner.clear().await
        }
    }

    #[tokio::test]
    async fn test_write_during_failover_is_not_lost() {
        let store = Arc::new(AdaptiveVectorStore::new(
            Arc::new(SlowListingStore {
                inner: InMemoryVectorStore::new("slow"),
            }),
            Arc::new(InMemoryVectorStore::default()),
        ));
        store.add_documents(&[chunk("early-chunk-0", "written before")]).await.unwrap();

        let failing = {
            let store = store.clone();
            tokio::spawn(async move { store.search("anything", 3).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.add_documents(&[chunk("late-chunk-0", "written during")]).await.unwrap(), 1);
        assert!(store.is_fallback_mode());
        failing.await.unwrap().unwrap();

        assert!(store.get_document("early-chunk-0").await.unwrap().is_some());
        assert!(store.get_document("late-chunk-0").await.unwrap().is_some());
        assert_eq!(store.get_store_info().failover.unwrap().migrated, 1);
    }
}
