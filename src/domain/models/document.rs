//! Document domain models
//!
//! A source document fans out into chunks; every chunk is stored as its own
//! [`Document`] and carries the parent's `sourceId` in its metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::chunking::estimate_tokens;

/// Metadata attached to every stored chunk.
///
/// Well-known fields are first-class members; anything else the caller supplies
/// is kept verbatim in `extra`. On the wire the record is one flat camelCase
/// object, so `{"sourceId": "a", "author": "b"}` round-trips unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    /// Identifier shared by all chunks of one original document
    #[serde(default)]
    pub source_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Position of this chunk within its source (0-based)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<usize>,

    /// Chunk length in characters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Caller-defined fields
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DocumentMetadata {
    /// Create metadata for a source with no other fields set
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            ..Self::default()
        }
    }

    /// Build metadata from an open JSON map supplied by a caller.
    ///
    /// Well-known keys with the right JSON type are promoted; keys whose value has
    /// an unexpected type stay in `extra` instead of being dropped.
    pub fn from_map(source_id: impl Into<String>, map: Map<String, Value>) -> Self {
        let mut metadata = Self::new(source_id);

        for (key, value) in map {
            match (key.as_str(), &value) {
                ("sourceId", _) => {}
                ("title", Value::String(s)) => metadata.title = Some(s.clone()),
                ("category", Value::String(s)) => metadata.category = Some(s.clone()),
                ("chunkIndex", Value::Number(n)) if n.as_u64().is_some() => {
                    metadata.chunk_index = n.as_u64().map(|v| v as usize);
                }
                ("totalChunks", Value::Number(n)) if n.as_u64().is_some() => {
                    metadata.total_chunks = n.as_u64().map(|v| v as usize);
                }
                ("chunkSize", Value::Number(n)) if n.as_u64().is_some() => {
                    metadata.chunk_size = n.as_u64().map(|v| v as usize);
                }
                ("createdAt", Value::String(s)) if parse_timestamp(s).is_some() => {
                    metadata.created_at = parse_timestamp(s);
                }
                ("updatedAt", Value::String(s)) if parse_timestamp(s).is_some() => {
                    metadata.updated_at = parse_timestamp(s);
                }
                _ => {
                    metadata.extra.insert(key, value);
                }
            }
        }

        metadata
    }

    /// Set the chunk position fields
    pub fn with_chunk(mut self, chunk_index: usize, total_chunks: usize, chunk_size: usize) -> Self {
        self.chunk_index = Some(chunk_index);
        self.total_chunks = Some(total_chunks);
        self.chunk_size = Some(chunk_size);
        self
    }

    /// Look up a field by its wire name, including well-known fields.
    pub fn get(&self, key: &str) -> Option<Value> {
        match key {
            "sourceId" => Some(Value::String(self.source_id.clone())),
            "title" => self.title.clone().map(Value::String),
            "category" => self.category.clone().map(Value::String),
            "chunkIndex" => self.chunk_index.map(Value::from),
            "totalChunks" => self.total_chunks.map(Value::from),
            "chunkSize" => self.chunk_size.map(Value::from),
            "createdAt" => self.created_at.map(|t| Value::String(t.to_rfc3339())),
            "updatedAt" => self.updated_at.map(|t| Value::String(t.to_rfc3339())),
            _ => self.extra.get(key).cloned(),
        }
    }

    /// Most recent known timestamp for this chunk
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.updated_at.or(self.created_at)
    }

    /// Flatten the textual metadata into one lowercase string for lexical matching.
    pub fn searchable_text(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(title) = &self.title {
            parts.push(title.clone());
        }
        if let Some(category) = &self.category {
            parts.push(category.clone());
        }
        for value in self.extra.values() {
            collect_text(value, &mut parts);
        }
        parts.join(" ").to_lowercase()
    }

    /// Serialize to a JSON object
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }
}

fn collect_text(value: &Value, parts: &mut Vec<String>) {
    match value {
        Value::String(s) => parts.push(s.clone()),
        Value::Number(n) => parts.push(n.to_string()),
        Value::Array(items) => items.iter().for_each(|item| collect_text(item, parts)),
        _ => {}
    }
}

/// Parse an RFC 3339 timestamp, returning `None` for anything else
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// A stored unit of text: one chunk of a source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>, metadata: DocumentMetadata) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata,
        }
    }

    /// Get a preview of the content (first 100 chars)
    pub fn preview(&self) -> String {
        if self.content.chars().count() <= 100 {
            self.content.clone()
        } else {
            format!("{}...", self.content.chars().take(100).collect::<String>())
        }
    }
}

/// A chunk produced by the document processor, ready to be stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedDocument {
    pub id: String,
    pub content: String,
    pub metadata: DocumentMetadata,

    /// Precomputed embedding; stores that need one compute it when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,

    /// Estimated token count
    pub token_count: usize,
}

impl ProcessedDocument {
    /// Deterministic chunk identifier: `{source_id}-chunk-{index}`
    pub fn chunk_id(source_id: &str, chunk_index: usize) -> String {
        format!("{source_id}-chunk-{chunk_index}")
    }

    pub fn new(id: String, content: String, metadata: DocumentMetadata) -> Self {
        let token_count = estimate_tokens(&content);
        Self {
            id,
            content,
            metadata,
            embedding: None,
            token_count,
        }
    }

    /// Drop the processing details and keep the stored shape
    pub fn to_document(&self) -> Document {
        Document::new(self.id.clone(), self.content.clone(), self.metadata.clone())
    }

    pub fn into_document(self) -> Document {
        Document::new(self.id, self.content, self.metadata)
    }
}

impl From<Document> for ProcessedDocument {
    fn from(document: Document) -> Self {
        Self::new(document.id, document.content, document.metadata)
    }
}

/// A search hit. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub document: Document,

    /// Relevance score, higher is better
    pub score: f32,

    /// Query terms or spans that matched, when the backend reports them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlights: Option<Vec<String>>,
}

impl QueryResult {
    pub fn new(document: Document, score: f32) -> Self {
        Self {
            document,
            score,
            highlights: None,
        }
    }

    pub fn with_highlights(mut self, highlights: Vec<String>) -> Self {
        self.highlights = Some(highlights);
        self
    }

    pub fn id(&self) -> &str {
        &self.document.id
    }

    pub fn source_id(&self) -> &str {
        &self.document.metadata.source_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chunk_id_format() {
        assert_eq!(ProcessedDocument::chunk_id("doc-1", 3), "doc-1-chunk-3");
    }

    #[test]
    fn test_metadata_from_map_promotes_known_fields() {
        let map = json!({
            "title": "Guide",
            "category": "manual",
            "author": "ops",
            "createdAt": "2024-05-01T10:00:00Z",
            "sourceId": "ignored"
        });
        let Value::Object(map) = map else { unreachable!() };

        let metadata = DocumentMetadata::from_map("src-1", map);
        assert_eq!(metadata.source_id, "src-1");
        assert_eq!(metadata.title.as_deref(), Some("Guide"));
        assert_eq!(metadata.category.as_deref(), Some("manual"));
        assert!(metadata.created_at.is_some());
        assert_eq!(metadata.extra.get("author"), Some(&json!("ops")));
        assert!(!metadata.extra.contains_key("sourceId"));
    }

    #[test]
    fn test_metadata_keeps_mistyped_known_fields_in_extra() {
        let Value::Object(map) = json!({"title": 42}) else { unreachable!() };
        let metadata = DocumentMetadata::from_map("s", map);
        assert!(metadata.title.is_none());
        assert_eq!(metadata.extra.get("title"), Some(&json!(42)));
    }

    #[test]
    fn test_metadata_serializes_flat_camel_case() {
        let mut metadata = DocumentMetadata::new("s").with_chunk(1, 4, 120);
        metadata.extra.insert("lang".to_string(), json!("en"));

        let value = metadata.to_value();
        assert_eq!(value["sourceId"], "s");
        assert_eq!(value["chunkIndex"], 1);
        assert_eq!(value["totalChunks"], 4);
        assert_eq!(value["chunkSize"], 120);
        assert_eq!(value["lang"], "en");

        let back: DocumentMetadata = serde_json::from_value(value).unwrap();
        assert_eq!(back, metadata);
    }

    #[test]
    fn test_metadata_get_and_searchable_text() {
        let Value::Object(map) = json!({"title": "Rust Book", "tags": ["async", "tokio"]}) else {
            unreachable!()
        };
        let metadata = DocumentMetadata::from_map("s", map);

        assert_eq!(metadata.get("sourceId"), Some(json!("s")));
        assert_eq!(metadata.get("title"), Some(json!("Rust Book")));
        assert_eq!(metadata.get("missing"), None);

        let text = metadata.searchable_text();
        assert!(text.contains("rust book"));
        assert!(text.contains("tokio"));
    }

    #[test]
    fn test_document_preview() {
        let short = Document::new("a", "short", DocumentMetadata::new("s"));
        assert_eq!(short.preview(), "short");

        let long = Document::new("a", "é".repeat(150), DocumentMetadata::new("s"));
        assert_eq!(long.preview().chars().count(), 103);
    }
}
