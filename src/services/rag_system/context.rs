//! Prompt context assembly.

use std::fmt::Write;

use crate::domain::errors::RagResult;
use crate::domain::models::QueryResult;

use super::types::{ContextFormat, ContextOptions};
use super::RagSystem;

impl RagSystem {
    /// Retrieve chunks for `query` and render them for inclusion in a prompt.
    ///
    /// Returns an empty string when nothing relevant is found.
    pub async fn get_context_for_prompt(&self, query: &str, options: &ContextOptions) -> RagResult<String> {
        let results = match &options.filter {
            Some(filter) => self.search_with_filter(query, filter, options.limit).await?,
            None => self.search(query, options.limit).await?,
        };

        Ok(match options.format {
            ContextFormat::Markdown => format_markdown(&results),
            ContextFormat::Raw => format_raw(&results),
        })
    }
}

pub(super) fn format_raw(results: &[QueryResult]) -> String {
    results
        .iter()
        .map(|r| r.document.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub(super) fn format_markdown(results: &[QueryResult]) -> String {
    if results.is_empty() {
        return String::new();
    }

    let mut out = String::from("## Relevant Context\n\n");
    for (position, result) in results.iter().enumerate() {
        let metadata = &result.document.metadata;
        let title = metadata.title.as_deref().unwrap_or(&metadata.source_id);
        let _ = writeln!(
            out,
            "### [{}] {title} (relevance: {:.2})",
            position + 1,
            result.score
        );

        let mut details = Vec::new();
        if let Some(category) = &metadata.category {
            details.push(format!("Category: {category}"));
        }
        if let (Some(index), Some(total)) = (metadata.chunk_index, metadata.total_chunks) {
            if total > 1 {
                details.push(format!("Part {} of {total}", index + 1));
            }
        }
        if let Some(timestamp) = metadata.timestamp() {
            details.push(format!("Date: {}", timestamp.format("%Y-%m-%d")));
        }
        if !details.is_empty() {
            let _ = writeln!(out, "*{}*", details.join(" | "));
        }

        let _ = writeln!(out, "\n{}\n", result.document.content.trim());
    }

    out.trim_end().to_string()
}
