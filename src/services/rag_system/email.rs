//! Email indexing and search.
//!
//! Emails are stored as ordinary documents under the source id
//! `email-{id}`, with sender, recipients, folder and date kept as metadata so
//! searches can be narrowed without touching the body text.

use std::fmt::Write;
use std::time::Instant;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::domain::errors::{RagError, RagResult};
use crate::domain::models::{
    BatchIndexOptions, BatchIndexReport, EmailConfig, EmailMessage, EmailSearchOptions, FilterOp,
    MetadataFilter, QueryResult,
};

use super::types::{AddedDocument, NewDocument};
use super::RagSystem;

const EMAIL_CATEGORY: &str = "email";
const DEFAULT_EMAIL_RESULTS: usize = 10;

impl RagSystem {
    /// Index a single email, replacing an earlier copy with the same id.
    pub async fn index_email_content(&self, email: &EmailMessage) -> RagResult<AddedDocument> {
        let document = email_document(email, self.email_config())?;
        self.add_document(&document.content, document.metadata).await
    }

    /// Batch options derived from the configured email limits.
    pub fn email_batch_options(&self) -> BatchIndexOptions {
        BatchIndexOptions::from(self.email_config())
    }

    /// Index emails in batches; a failing batch does not stop the others.
    ///
    /// `None` uses [`Self::email_batch_options`]. An id repeated within a batch
    /// is indexed once, from its last occurrence.
    pub async fn batch_index_emails(
        &self,
        emails: &[EmailMessage],
        options: Option<BatchIndexOptions>,
    ) -> BatchIndexReport {
        let started = Instant::now();
        let mut report = BatchIndexReport::default();
        let options = options.unwrap_or_else(|| self.email_batch_options());
        let batch_size = options.batch_size.max(1);

        for (batch_number, batch) in emails.chunks(batch_size).enumerate() {
            let mut documents = Vec::with_capacity(batch.len());
            let mut ids = Vec::with_capacity(batch.len());

            for email in batch {
                match email_document(email, self.email_config()) {
                    Ok(document) => {
                        documents.push(document);
                        ids.retain(|id| id != &email.id);
                        ids.push(email.id.clone());
                    }
                    Err(err) => {
                        report.failed += 1;
                        report.errors.push((email.id.clone(), err.to_string()));
                    }
                }
            }

            if documents.is_empty() {
                continue;
            }

            match self.add_documents(documents).await {
                Ok(_) => report.indexed += ids.len(),
                Err(err) => {
                    warn!(batch = batch_number, emails = ids.len(), error = %err, "email batch failed");
                    report.failed += ids.len();
                    let message = err.to_string();
                    report
                        .errors
                        .extend(ids.into_iter().map(|id| (id, message.clone())));
                }
            }
        }

        report.time_elapsed = started.elapsed();
        info!(
            indexed = report.indexed,
            failed = report.failed,
            elapsed_ms = u64::try_from(report.time_elapsed.as_millis()).unwrap_or(u64::MAX),
            "email batch indexing finished"
        );
        report
    }

    /// Search indexed emails, optionally narrowed by sender, folder and date.
    pub async fn search_emails(
        &self,
        query: &str,
        options: &EmailSearchOptions,
    ) -> RagResult<Vec<QueryResult>> {
        let filter = email_filter(options);
        let limit = options.limit.unwrap_or(DEFAULT_EMAIL_RESULTS);
        self.search_with_filter(query, &filter, limit).await
    }

    /// Render matching emails as a prompt context block.
    pub async fn get_email_context(&self, query: &str, limit: usize) -> RagResult<String> {
        let options = EmailSearchOptions {
            limit: Some(limit),
            ..EmailSearchOptions::default()
        };
        let results = self.search_emails(query, &options).await?;
        Ok(format_email_context(&results))
    }
}

fn timestamp_text(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Longest prefix of `text` within `max_bytes` that ends on a char boundary.
fn truncate_bytes(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn capped(addresses: &[String], max: usize) -> Vec<String> {
    addresses.iter().take(max).cloned().collect()
}

/// Build the document stored for `email`, applying the configured caps.
fn email_document(email: &EmailMessage, limits: &EmailConfig) -> RagResult<NewDocument> {
    if email.id.trim().is_empty() {
        return Err(RagError::Validation("email id cannot be empty".to_string()));
    }

    let subject: String = email.subject.chars().take(limits.max_subject_chars).collect();
    let body = truncate_bytes(&email.body, limits.max_body_bytes);
    let to = capped(&email.to, limits.max_recipients);
    let cc = capped(&email.cc, limits.max_recipients);

    let mut content = String::new();
    let _ = writeln!(content, "Subject: {subject}");
    let _ = writeln!(content, "From: {}", email.from);
    if !to.is_empty() {
        let _ = writeln!(content, "To: {}", to.join(", "));
    }
    if !cc.is_empty() {
        let _ = writeln!(content, "Cc: {}", cc.join(", "));
    }
    if let Some(date) = &email.date {
        let _ = writeln!(content, "Date: {}", timestamp_text(date));
    }
    content.push('\n');
    content.push_str(body);

    let mut metadata = Map::new();
    metadata.insert("sourceId".to_string(), json!(email.source_id()));
    metadata.insert("title".to_string(), json!(subject));
    metadata.insert("category".to_string(), json!(EMAIL_CATEGORY));
    metadata.insert("emailId".to_string(), json!(email.id));
    metadata.insert("from".to_string(), json!(email.from));
    metadata.insert("to".to_string(), json!(to));
    if !cc.is_empty() {
        metadata.insert("cc".to_string(), json!(cc));
    }
    if let Some(folder) = &email.folder {
        metadata.insert("folder".to_string(), json!(folder));
    }
    if let Some(thread_id) = &email.thread_id {
        metadata.insert("threadId".to_string(), json!(thread_id));
    }
    if let Some(date) = &email.date {
        let text = timestamp_text(date);
        metadata.insert("date".to_string(), Value::String(text.clone()));
        metadata.insert("createdAt".to_string(), Value::String(text));
    }

    Ok(NewDocument { content, metadata })
}

fn email_filter(options: &EmailSearchOptions) -> MetadataFilter {
    let mut filter = MetadataFilter::new().equals("category", EMAIL_CATEGORY);
    if let Some(from) = &options.from {
        filter = filter.equals("from", from.as_str());
    }
    if let Some(folder) = &options.folder {
        filter = filter.equals("folder", folder.as_str());
    }
    if let Some(date_from) = &options.date_from {
        filter = filter.with_op("date", FilterOp::Gte(json!(timestamp_text(date_from))));
    }
    if let Some(date_to) = &options.date_to {
        filter = filter.with_op("date", FilterOp::Lte(json!(timestamp_text(date_to))));
    }
    filter
}

fn format_email_context(results: &[QueryResult]) -> String {
    if results.is_empty() {
        return String::new();
    }

    let mut out = String::from("## Relevant Emails\n\n");
    for (position, result) in results.iter().enumerate() {
        let metadata = &result.document.metadata;
        let subject = metadata.title.as_deref().unwrap_or("(no subject)");
        let from = metadata
            .extra
            .get("from")
            .and_then(Value::as_str)
            .unwrap_or("unknown sender");
        let date = metadata
            .extra
            .get("date")
            .and_then(Value::as_str)
            .map(|d| format!(", {d}"))
            .unwrap_or_default();

        let _ = writeln!(out, "### [{}] {subject} (from {from}{date})", position + 1);
        let _ = writeln!(out, "\n{}\n", result.document.content.trim());
    }

    out.trim_end().to_string()
}
