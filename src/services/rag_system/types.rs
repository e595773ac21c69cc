//! Public request, report and status types for [`super::RagSystem`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::errors::RagError;
use crate::domain::models::{ChunkingConfig, MetadataFilter};
use crate::infrastructure::vector::{HealthReport, HealthStatus, StoreInfo};
use crate::services::EmbeddingStats;

/// A document submitted for ingestion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    pub content: String,
    /// Caller metadata; `sourceId` (or `id`) names the source
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl NewDocument {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Map::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextFormat {
    /// Ranked sections with a metadata header per chunk
    #[default]
    Markdown,
    /// Chunk contents only, separated by blank lines
    Raw,
}

/// Options for [`super::RagSystem::get_context_for_prompt`].
#[derive(Debug, Clone, PartialEq)]
pub struct ContextOptions {
    pub limit: usize,
    pub format: ContextFormat,
    pub filter: Option<MetadataFilter>,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            limit: 5,
            format: ContextFormat::Markdown,
            filter: None,
        }
    }
}

/// Interchange format for export and import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferFormat {
    /// Array of `{id, content, metadata}` objects
    #[default]
    Json,
    /// `id,content,metadata` rows, metadata as JSON text
    Csv,
}

impl fmt::Display for TransferFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

impl FromStr for TransferFormat {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(RagError::Validation(format!(
                "unsupported format '{other}', expected json or csv"
            ))),
        }
    }
}

/// Outcome of an import.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub failed: usize,
    /// `(record id or position, error)` per rejected record
    pub errors: Vec<(String, String)>,
}

/// Snapshot of the system's contents and backends.
#[derive(Debug, Clone, Serialize)]
pub struct RagStats {
    /// Distinct sources
    pub documents: usize,
    pub chunks: usize,
    pub collections: Vec<String>,
    pub store: StoreInfo,
    pub embedding: EmbeddingStats,
    pub chunking: ChunkingConfig,
}

/// Overall health, combining the store probe with embedding degradation.
#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    pub status: HealthStatus,
    pub initialized: bool,
    pub store: HealthReport,
    pub embedding: EmbeddingStats,
}

impl SystemHealth {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Result of ingesting one source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddedDocument {
    pub source_id: String,
    /// Ids of the stored chunks, in order
    pub chunk_ids: Vec<String>,
}
