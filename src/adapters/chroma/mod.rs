//! Chroma vector store adapter.
//!
//! Talks to a Chroma-compatible server over its `/api/v1` REST surface. The
//! collection is created on first use with cosine distance, embeddings are
//! computed locally through [`EmbeddingService`], and scores are reported as
//! `1 - distance`.
//!
//! Chroma only stores scalar metadata values, so arrays and objects are written
//! as JSON text and decoded again when read back.

pub mod models;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use self::models::{
    ChromaMetadata, CollectionResponse, CreateCollectionRequest, DeleteRequest, GetRequest,
    GetResponse, QueryRequest, QueryResponse, UpsertRequest,
};
use crate::domain::errors::{RagError, RagResult};
use crate::domain::models::{
    Condition, Document, DocumentMetadata, FilterOp, MetadataFilter, ProcessedDocument, QueryResult,
    VectorStoreConfig,
};
use crate::domain::ports::VectorStore;
use crate::infrastructure::logging::scrub_message;
use crate::services::EmbeddingService;

const BACKEND: &str = "chroma";
const TOKEN_HEADER: &str = "x-chroma-token";
const PAGE_SIZE: usize = 1000;
/// Extra candidates fetched when part of a filter has to be applied locally.
const LOCAL_FILTER_OVERFETCH: usize = 4;

/// Connection settings for a Chroma server.
#[derive(Debug, Clone)]
pub struct ChromaConfig {
    pub base_url: String,
    pub collection: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl ChromaConfig {
    pub fn from_store_config(config: &VectorStoreConfig) -> RagResult<Self> {
        let base_url = config
            .base_url
            .clone()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| RagError::InvalidConfig("chroma store requires a base_url".to_string()))?;

        Ok(Self {
            base_url,
            collection: config.collection_name.clone(),
            api_key: config.api_key.clone(),
            timeout_secs: config.timeout_secs,
        })
    }
}

/// Vector store backed by a Chroma server.
pub struct ChromaVectorStore {
    config: ChromaConfig,
    client: Client,
    embeddings: Arc<EmbeddingService>,
    collection_id: RwLock<Option<String>>,
}

impl ChromaVectorStore {
    pub fn new(config: ChromaConfig, embeddings: Arc<EmbeddingService>) -> RagResult<Self> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            let value = HeaderValue::from_str(key)
                .map_err(|_| RagError::InvalidConfig("chroma api_key is not a valid header value".to_string()))?;
            headers.insert(TOKEN_HEADER, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| RagError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            embeddings,
            collection_id: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.config.base_url.trim_end_matches('/'))
    }

    async fn execute(&self, request: RequestBuilder, operation: &str) -> RagResult<Response> {
        let response = request.send().await.map_err(|e| {
            RagError::store(BACKEND, scrub_message(&format!("{operation} request failed: {e}")))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::store(
                BACKEND,
                scrub_message(&format!("{operation} returned {status}: {body}")),
            ));
        }
        Ok(response)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, operation: &str) -> RagResult<T> {
        self.execute(request, operation)
            .await?
            .json::<T>()
            .await
            .map_err(|e| RagError::store(BACKEND, format!("invalid {operation} response: {e}")))
    }

    /// Resolve (creating if needed) the collection id.
    async fn collection_id(&self) -> RagResult<String> {
        if let Some(id) = self.collection_id.read().await.as_ref() {
            return Ok(id.clone());
        }

        let mut slot = self.collection_id.write().await;
        if let Some(id) = slot.as_ref() {
            return Ok(id.clone());
        }

        let request = CreateCollectionRequest {
            name: &self.config.collection,
            metadata: json!({ "hnsw:space": "cosine" }),
            get_or_create: true,
        };
        let collection: CollectionResponse = self
            .send(self.client.post(self.url("/collections")).json(&request), "create collection")
            .await?;

        debug!(collection = %collection.name, id = %collection.id, backend = BACKEND, "collection resolved");
        *slot = Some(collection.id.clone());
        Ok(collection.id)
    }

    async fn collection_request<B>(&self, action: &str, body: &B) -> RagResult<RequestBuilder>
    where
        B: serde::Serialize + Sync,
    {
        let id = self.collection_id().await?;
        let url = self.url(&format!("/collections/{id}/{action}"));
        Ok(self.client.post(url).json(body))
    }

    async fn get(&self, request: GetRequest) -> RagResult<GetResponse> {
        let request = self.collection_request("get", &request).await?;
        self.send(request, "get").await
    }

    async fn query(
        &self,
        query: &str,
        filter: Option<&MetadataFilter>,
        limit: usize,
    ) -> RagResult<Vec<QueryResult>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let (clause, fully_translated) = filter.map_or((None, true), where_clause);
        let n_results = if fully_translated {
            limit
        } else {
            limit.saturating_mul(LOCAL_FILTER_OVERFETCH)
        };

        let request = QueryRequest {
            query_embeddings: vec![self.embeddings.embed(query).await?],
            n_results,
            where_clause: clause,
            include: vec!["documents", "metadatas", "distances"],
        };
        let request = self.collection_request("query", &request).await?;
        let response: QueryResponse = self.send(request, "query").await?;

        let mut results: Vec<QueryResult> = query_results(response)
            .into_iter()
            .filter(|result| filter.is_none_or(|f| f.matches(&result.document.metadata)))
            .collect();
        results.truncate(limit);
        Ok(results)
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

fn op_translates(op: &FilterOp) -> bool {
    match op {
        FilterOp::In(values) | FilterOp::NotIn(values) => {
            !values.is_empty() && values.iter().all(is_scalar)
        }
        FilterOp::Ne(value) => is_scalar(value),
        // Chroma only orders numbers
        FilterOp::Gt(bound) | FilterOp::Gte(bound) | FilterOp::Lt(bound) | FilterOp::Lte(bound) => {
            bound.is_number()
        }
    }
}

fn field_clause(field: &str, condition: Value) -> Value {
    let mut clause = Map::new();
    clause.insert(field.to_string(), condition);
    Value::Object(clause)
}

/// Translate `filter` into a Chroma `where` document.
///
/// Conditions Chroma cannot express are left out and reported through the
/// second element, in which case results must be filtered locally.
fn where_clause(filter: &MetadataFilter) -> (Option<Value>, bool) {
    let mut clauses = Vec::new();
    let mut complete = true;

    for (field, condition) in filter.conditions() {
        match condition {
            Condition::Equals(value) if is_scalar(value) => {
                clauses.push(field_clause(field, value.clone()));
            }
            Condition::AnyOf(values) if !values.is_empty() && values.iter().all(is_scalar) => {
                clauses.push(field_clause(field, json!({ "$in": values })));
            }
            Condition::Operators(ops) => {
                for op in ops {
                    if op_translates(op) {
                        let mut operator = Map::new();
                        operator.insert(op.key().to_string(), op.operand());
                        clauses.push(field_clause(field, Value::Object(operator)));
                    } else {
                        complete = false;
                    }
                }
            }
            _ => complete = false,
        }
    }

    let clause = match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(json!({ "$and": clauses })),
    };
    (clause, complete)
}

fn encode_metadata(metadata: &DocumentMetadata) -> ChromaMetadata {
    let Value::Object(fields) = metadata.to_value() else {
        return Map::new();
    };

    fields
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::Array(_) | Value::Object(_) => Some((key, Value::String(value.to_string()))),
            scalar => Some((key, scalar)),
        })
        .collect()
}

fn decode_metadata(id: &str, fields: ChromaMetadata) -> DocumentMetadata {
    let source_id = fields
        .get("sourceId")
        .and_then(Value::as_str)
        .map_or_else(|| id.to_string(), str::to_string);

    let restored = fields
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(text) if text.starts_with('[') || text.starts_with('{') => {
                    serde_json::from_str(&text).unwrap_or(Value::String(text))
                }
                other => other,
            };
            (key, value)
        })
        .collect();

    DocumentMetadata::from_map(source_id, restored)
}

fn documents_from_columns(response: GetResponse) -> Vec<Document> {
    let mut contents = response.documents.unwrap_or_default().into_iter();
    let mut metadatas = response.metadatas.unwrap_or_default().into_iter();

    response
        .ids
        .into_iter()
        .map(|id| {
            let content = contents.next().flatten().unwrap_or_default();
            let metadata = decode_metadata(&id, metadatas.next().flatten().unwrap_or_default());
            Document::new(id, content, metadata)
        })
        .collect()
}

fn query_results(response: QueryResponse) -> Vec<QueryResult> {
    let ids = response.ids.into_iter().next().unwrap_or_default();
    let mut contents = response
        .documents
        .and_then(|columns| columns.into_iter().next())
        .unwrap_or_default()
        .into_iter();
    let mut metadatas = response
        .metadatas
        .and_then(|columns| columns.into_iter().next())
        .unwrap_or_default()
        .into_iter();
    let mut distances = response
        .distances
        .and_then(|columns| columns.into_iter().next())
        .unwrap_or_default()
        .into_iter();

    ids.into_iter()
        .map(|id| {
            let content = contents.next().flatten().unwrap_or_default();
            let metadata = decode_metadata(&id, metadatas.next().flatten().unwrap_or_default());
            let distance = distances.next().flatten().unwrap_or(1.0);
            QueryResult::new(Document::new(id, content, metadata), 1.0 - distance)
        })
        .collect()
}

#[async_trait]
impl VectorStore for ChromaVectorStore {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn initialize(&self) -> RagResult<()> {
        let id = self.collection_id().await?;
        info!(collection = %self.config.collection, id = %id, backend = BACKEND, "vector store initialized");
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

        let mut request = UpsertRequest {
            ids: Vec::with_capacity(documents.len()),
            embeddings: Vec::with_capacity(documents.len()),
            documents: Vec::with_capacity(documents.len()),
            metadatas: Vec::with_capacity(documents.len()),
        };
        for document in documents {
            let embedding = match &document.embedding {
                Some(embedding) => embedding.clone(),
                None => computed
                    .next()
                    .ok_or_else(|| RagError::Embedding("missing computed embedding".to_string()))?,
            };
            request.ids.push(document.id.clone());
            request.embeddings.push(embedding);
            request.documents.push(document.content.clone());
            request.metadatas.push(encode_metadata(&document.metadata));
        }

        let request = self.collection_request("upsert", &request).await?;
        self.execute(request, "upsert").await?;
        debug!(chunks = documents.len(), backend = BACKEND, "documents added");
        Ok(documents.len())
    }

    async fn search(&self, query: &str, limit: usize) -> RagResult<Vec<QueryResult>> {
        self.query(query, None, limit).await
    }

    async fn search_with_filter(
        &self,
        query: &str,
        filter: &MetadataFilter,
        limit: usize,
    ) -> RagResult<Vec<QueryResult>> {
        self.query(query, Some(filter), limit).await
    }

    async fn get_document(&self, id: &str) -> RagResult<Option<Document>> {
        let response = self
            .get(GetRequest {
                ids: Some(vec![id.to_string()]),
                include: vec!["documents", "metadatas"],
                ..GetRequest::default()
            })
            .await?;

        Ok(documents_from_columns(response).into_iter().next())
    }

    async fn delete_by_source_id(&self, source_id: &str) -> RagResult<usize> {
        let matching = self
            .get(GetRequest {
                where_clause: Some(json!({ "sourceId": source_id })),
                include: Vec::new(),
                ..GetRequest::default()
            })
            .await?;

        let removed = matching.ids.len();
        if removed > 0 {
            let request = self
                .collection_request("delete", &DeleteRequest { ids: matching.ids })
                .await?;
            self.execute(request, "delete").await?;
        }

        debug!(source_id, chunks = removed, backend = BACKEND, "source deleted");
        Ok(removed)
    }

    async fn get_all_documents(&self, limit: usize, offset: usize) -> RagResult<Vec<Document>> {
        let response = self
            .get(GetRequest {
                limit: Some(limit),
                offset: Some(offset),
                include: vec!["documents", "metadatas"],
                ..GetRequest::default()
            })
            .await?;

        Ok(documents_from_columns(response))
    }

    async fn get_document_count(&self) -> RagResult<usize> {
        let mut sources = HashSet::new();
        let mut offset = 0;

        loop {
            let page = self
                .get(GetRequest {
                    limit: Some(PAGE_SIZE),
                    offset: Some(offset),
                    include: vec!["metadatas"],
                    ..GetRequest::default()
                })
                .await?;
            let fetched = page.ids.len();

            for (id, metadata) in page
                .ids
                .iter()
                .zip(page.metadatas.unwrap_or_default().into_iter().chain(std::iter::repeat(None)))
            {
                let source = metadata
                    .as_ref()
                    .and_then(|m| m.get("sourceId"))
                    .and_then(Value::as_str)
                    .unwrap_or(id.as_str());
                sources.insert(source.to_string());
            }

            if fetched < PAGE_SIZE {
                break;
            }
            offset += fetched;
        }

        Ok(sources.len())
    }

    async fn get_chunk_count(&self) -> RagResult<usize> {
        let id = self.collection_id().await?;
        let url = self.url(&format!("/collections/{id}/count"));
        self.send(self.client.get(url), "count").await
    }

    async fn get_collections(&self) -> RagResult<Vec<String>> {
        let collections: Vec<CollectionResponse> = self
            .send(self.client.get(self.url("/collections")), "list collections")
            .await?;
        Ok(collections.into_iter().map(|c| c.name).collect())
    }

    async fn clear(&self) -> RagResult<()> {
        let mut slot = self.collection_id.write().await;
        let url = self.url(&format!("/collections/{}", self.config.collection));
        self.execute(self.client.delete(url), "delete collection").await?;
        *slot = None;
        info!(collection = %self.config.collection, backend = BACKEND, "collection cleared");
        Ok(())
    }
}
