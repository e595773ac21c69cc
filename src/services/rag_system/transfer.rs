//! Export and import of stored chunks.
//!
//! Both formats carry chunks exactly as stored, so an import restores the same
//! ids without re-chunking. CSV follows RFC 4180: fields containing commas,
//! quotes or line breaks are quoted and embedded quotes are doubled.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::domain::errors::{RagError, RagResult};
use crate::domain::models::{Document, DocumentMetadata, ProcessedDocument};
use crate::domain::ports::VectorStore;

use super::types::{ImportReport, TransferFormat};
use super::RagSystem;

const EXPORT_PAGE_SIZE: usize = 1000;
const IMPORT_BATCH_SIZE: usize = 100;
const CSV_HEADER: [&str; 3] = ["id", "content", "metadata"];

impl RagSystem {
    /// Serialize every stored chunk in `format`.
    pub async fn export_documents(&self, format: TransferFormat) -> RagResult<String> {
        let mut documents = Vec::new();
        let mut offset = 0;
        loop {
            let page = self.list_documents(EXPORT_PAGE_SIZE, offset).await?;
            let fetched = page.len();
            documents.extend(page);
            if fetched < EXPORT_PAGE_SIZE {
                break;
            }
            offset += fetched;
        }

        info!(chunks = documents.len(), format = %format, "documents exported");
        match format {
            TransferFormat::Json => Ok(serde_json::to_string_pretty(&documents)?),
            TransferFormat::Csv => Ok(write_csv(&documents)),
        }
    }

    /// Load chunks produced by [`RagSystem::export_documents`].
    ///
    /// Malformed input as a whole is an error; individual bad records are
    /// reported and skipped.
    pub async fn import_documents(&self, data: &str, format: TransferFormat) -> RagResult<ImportReport> {
        self.initialize().await;

        let (records, mut report) = match format {
            TransferFormat::Json => parse_json(data)?,
            TransferFormat::Csv => parse_csv(data)?,
        };

        for batch in records.chunks(IMPORT_BATCH_SIZE) {
            let chunks: Vec<ProcessedDocument> = batch.iter().cloned().map(ProcessedDocument::from).collect();
            match self.store().add_documents(&chunks).await {
                Ok(_) => report.imported += batch.len(),
                Err(err) => {
                    warn!(records = batch.len(), error = %err, "import batch failed");
                    report.failed += batch.len();
                    let message = err.to_string();
                    report
                        .errors
                        .extend(batch.iter().map(|d| (d.id.clone(), message.clone())));
                }
            }
        }

        info!(imported = report.imported, failed = report.failed, format = %format, "documents imported");
        Ok(report)
    }
}

#[derive(Debug, Deserialize)]
struct JsonRecord {
    #[serde(default)]
    id: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    metadata: Map<String, Value>,
}

fn record_to_document(id: String, content: String, metadata: Map<String, Value>) -> RagResult<Document> {
    if id.trim().is_empty() {
        return Err(RagError::Validation("record has no id".to_string()));
    }
    if content.trim().is_empty() {
        return Err(RagError::Validation("record has no content".to_string()));
    }

    let source_id = match metadata.get("sourceId") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => id.clone(),
    };
    Ok(Document::new(id, content, DocumentMetadata::from_map(source_id, metadata)))
}

fn reject(report: &mut ImportReport, label: String, err: &RagError) {
    report.failed += 1;
    report.errors.push((label, err.to_string()));
}

fn parse_json(data: &str) -> RagResult<(Vec<Document>, ImportReport)> {
    let values: Vec<Value> = serde_json::from_str(data)
        .map_err(|e| RagError::Import(format!("expected a JSON array of documents: {e}")))?;

    let mut report = ImportReport::default();
    let mut documents = Vec::with_capacity(values.len());
    for (position, value) in values.into_iter().enumerate() {
        let parsed = serde_json::from_value::<JsonRecord>(value)
            .map_err(RagError::from)
            .and_then(|r| record_to_document(r.id, r.content, r.metadata));
        match parsed {
            Ok(document) => documents.push(document),
            Err(err) => reject(&mut report, format!("#{position}"), &err),
        }
    }
    Ok((documents, report))
}

fn parse_csv(data: &str) -> RagResult<(Vec<Document>, ImportReport)> {
    let mut rows = read_csv(data)?.into_iter();
    let header = rows
        .next()
        .ok_or_else(|| RagError::Import("CSV input is empty".to_string()))?;
    let header: Vec<&str> = header.iter().map(|h| h.trim()).collect();
    if header != CSV_HEADER {
        return Err(RagError::Import(format!(
            "expected CSV header 'id,content,metadata', found '{}'",
            header.join(",")
        )));
    }

    let mut report = ImportReport::default();
    let mut documents = Vec::new();
    for (line, row) in rows.enumerate() {
        let label = row.first().cloned().filter(|id| !id.is_empty()).unwrap_or_else(|| format!("row {}", line + 2));
        let parsed = csv_row_to_document(row);
        match parsed {
            Ok(document) => documents.push(document),
            Err(err) => reject(&mut report, label, &err),
        }
    }
    Ok((documents, report))
}

fn csv_row_to_document(row: Vec<String>) -> RagResult<Document> {
    let [id, content, metadata]: [String; 3] = row
        .try_into()
        .map_err(|row: Vec<String>| RagError::Validation(format!("expected 3 fields, found {}", row.len())))?;

    let metadata = if metadata.trim().is_empty() {
        Map::new()
    } else {
        match serde_json::from_str::<Value>(&metadata)? {
            Value::Object(map) => map,
            _ => return Err(RagError::Validation("metadata must be a JSON object".to_string())),
        }
    };

    record_to_document(id, content, metadata)
}

fn escape_csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn write_csv(documents: &[Document]) -> String {
    let mut out = CSV_HEADER.join(",");
    out.push_str("\r\n");
    for document in documents {
        let metadata = document.metadata.to_value().to_string();
        out.push_str(&escape_csv_field(&document.id));
        out.push(',');
        out.push_str(&escape_csv_field(&document.content));
        out.push(',');
        out.push_str(&escape_csv_field(&metadata));
        out.push_str("\r\n");
    }
    out
}

/// Split RFC 4180 text into rows of fields. Accepts `\n` or `\r\n` row ends.
fn read_csv(data: &str) -> RagResult<Vec<Vec<String>>> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = data.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                other => field.push(other),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            other => field.push(other),
        }
    }

    if in_quotes {
        return Err(RagError::Import("unterminated quoted CSV field".to_string()));
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    // Blank lines carry no record
    rows.retain(|r| !(r.len() == 1 && r[0].is_empty()));
    Ok(rows)
}
