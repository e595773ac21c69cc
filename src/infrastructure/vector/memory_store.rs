//! In-memory vector store
//!
//! Fallback backend with no external dependencies. It does not use embeddings
//! at all: search is lexical, scoring query-term occurrences in the chunk
//! content and (double-weighted) in its metadata.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::errors::RagResult;
use crate::domain::models::{Document, MetadataFilter, ProcessedDocument, QueryResult};
use crate::domain::ports::VectorStore;

/// Query terms shorter than this are ignored
pub const MIN_TERM_LEN: usize = 3;

/// Weight of a metadata match relative to a content match
const METADATA_WEIGHT: f32 = 2.0;

/// Lowercased whitespace-separated query terms of at least [`MIN_TERM_LEN`] chars
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .filter(|term| term.chars().count() >= MIN_TERM_LEN)
        .collect()
}

struct StoredChunk {
    /// Insertion order, used for stable paging and tie-breaking
    seq: u64,
    document: Document,
}

#[derive(Default)]
struct Inner {
    chunks: HashMap<String, StoredChunk>,
    by_source: HashMap<String, HashSet<String>>,
    next_seq: u64,
}

impl Inner {
    fn upsert(&mut self, document: Document) {
        let source_id = document.metadata.source_id.clone();
        let id = document.id.clone();

        let seq = match self.chunks.remove(&id) {
            Some(previous) => {
                self.unlink(&previous.document.metadata.source_id, &id);
                previous.seq
            }
            None => {
                self.next_seq += 1;
                self.next_seq
            }
        };

        self.by_source.entry(source_id).or_default().insert(id.clone());
        self.chunks.insert(id, StoredChunk { seq, document });
    }

    fn unlink(&mut self, source_id: &str, id: &str) {
        if let Some(ids) = self.by_source.get_mut(source_id) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_source.remove(source_id);
            }
        }
    }

    fn ordered(&self) -> Vec<&StoredChunk> {
        let mut chunks: Vec<&StoredChunk> = self.chunks.values().collect();
        chunks.sort_by_key(|chunk| chunk.seq);
        chunks
    }
}

/// Lexical in-memory store.
///
/// The chunk map and the sourceId index live behind a single lock so every
/// insert or delete updates both atomically.
pub struct InMemoryVectorStore {
    collection: String,
    inner: RwLock<Inner>,
}

impl InMemoryVectorStore {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Score every stored chunk against `query`, best first
    async fn score(&self, query: &str) -> Vec<QueryResult> {
        let terms = query_terms(query);
        if terms.is_empty() {
            return Vec::new();
        }

        let inner = self.inner.read().await;
        let mut scored: Vec<(u64, QueryResult)> = inner
            .chunks
            .values()
            .filter_map(|chunk| {
                let (score, highlights) = lexical_score(&terms, &chunk.document);
                (score > 0.0).then(|| {
                    (
                        chunk.seq,
                        QueryResult::new(chunk.document.clone(), score).with_highlights(highlights),
                    )
                })
            })
            .collect();

        scored.sort_by(|(seq_a, a), (seq_b, b)| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(seq_a.cmp(seq_b))
        });

        scored.into_iter().map(|(_, result)| result).collect()
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new("memory")
    }
}

fn lexical_score(terms: &[String], document: &Document) -> (f32, Vec<String>) {
    let content = document.content.to_lowercase();
    let metadata = document.metadata.searchable_text();

    let mut total = 0.0;
    let mut highlights = Vec::new();
    for term in terms {
        let in_content = content.matches(term.as_str()).count() as f32;
        let in_metadata = metadata.matches(term.as_str()).count() as f32;
        let hits = in_content + METADATA_WEIGHT * in_metadata;
        if hits > 0.0 && !highlights.contains(term) {
            highlights.push(term.clone());
        }
        total += hits;
    }

    (total / terms.len() as f32, highlights)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn initialize(&self) -> RagResult<()> {
        Ok(())
    }

    async fn add_documents(&self, documents: &[ProcessedDocument]) -> RagResult<usize> {
        let mut inner = self.inner.write().await;
        for document in documents {
            inner.upsert(document.to_document());
        }
        debug!(chunks = documents.len(), backend = "memory", "documents added");
        Ok(documents.len())
    }

    async fn search(&self, query: &str, limit: usize) -> RagResult<Vec<QueryResult>> {
        let mut results = self.score(query).await;
        results.truncate(limit);
        Ok(results)
    }

    async fn search_with_filter(
        &self,
        query: &str,
        filter: &MetadataFilter,
        limit: usize,
    ) -> RagResult<Vec<QueryResult>> {
        Ok(self
            .score(query)
            .await
            .into_iter()
            .filter(|result| filter.matches(&result.document.metadata))
            .take(limit)
            .collect())
    }

    async fn get_document(&self, id: &str) -> RagResult<Option<Document>> {
        let inner = self.inner.read().await;
        Ok(inner.chunks.get(id).map(|chunk| chunk.document.clone()))
    }

    async fn delete_by_source_id(&self, source_id: &str) -> RagResult<usize> {
        let mut inner = self.inner.write().await;
        let Some(ids) = inner.by_source.remove(source_id) else {
            return Ok(0);
        };
        for id in &ids {
            inner.chunks.remove(id);
        }
        debug!(source_id, chunks = ids.len(), backend = "memory", "source deleted");
        Ok(ids.len())
    }

    async fn get_all_documents(&self, limit: usize, offset: usize) -> RagResult<Vec<Document>> {
        let inner = self.inner.read().await;
        Ok(inner
            .ordered()
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|chunk| chunk.document.clone())
            .collect())
    }

    async fn get_document_count(&self) -> RagResult<usize> {
        Ok(self.inner.read().await.by_source.len())
    }

    async fn get_chunk_count(&self) -> RagResult<usize> {
        Ok(self.inner.read().await.chunks.len())
    }

    async fn get_collections(&self) -> RagResult<Vec<String>> {
        Ok(vec![self.collection.clone()])
    }

    async fn clear(&self) -> RagResult<()> {
        *self.inner.write().await = Inner::default();
        Ok(())
    }
}
