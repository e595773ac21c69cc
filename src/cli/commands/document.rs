//! `add`, `delete` and `list` commands.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use serde_json::{json, Map, Value};

use crate::cli::output::{create_spinner, ProgressBarExt, TableFormatter};
use crate::services::RagSystem;

/// Metadata for a file ingested from the command line.
pub fn file_metadata(
    file: &Path,
    source_id: Option<String>,
    title: Option<String>,
    category: Option<String>,
) -> Map<String, Value> {
    let mut metadata = Map::new();
    let source_id = source_id.unwrap_or_else(|| file.display().to_string());
    let title = title.or_else(|| file.file_name().map(|n| n.to_string_lossy().into_owned()));

    metadata.insert("sourceId".to_string(), json!(source_id));
    metadata.insert("path".to_string(), json!(file.display().to_string()));
    if let Some(title) = title {
        metadata.insert("title".to_string(), json!(title));
    }
    if let Some(category) = category {
        metadata.insert("category".to_string(), json!(category));
    }
    metadata
}

/// Handle add command
pub async fn handle_add(
    system: &RagSystem,
    file: &Path,
    source_id: Option<String>,
    title: Option<String>,
    category: Option<String>,
    json: bool,
) -> Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let metadata = file_metadata(file, source_id, title, category);

    let spinner = create_spinner(format!("Indexing {}", file.display()), json);
    let added = system
        .add_document(&content, metadata)
        .await
        .context("Failed to add document")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&added)?);
    } else if added.chunk_ids.is_empty() {
        spinner.finish_warning(format!("{} is empty, nothing stored", file.display()));
    } else {
        spinner.finish_success(format!(
            "Indexed {} as {} ({} chunk{})",
            file.display(),
            style(&added.source_id).cyan(),
            added.chunk_ids.len(),
            if added.chunk_ids.len() == 1 { "" } else { "s" }
        ));
    }

    Ok(())
}

/// Handle delete command
pub async fn handle_delete(system: &RagSystem, source_id: &str, json: bool) -> Result<()> {
    let deleted = system
        .delete_document(source_id)
        .await
        .context("Failed to delete document")?;

    if json {
        let output = json!({ "source_id": source_id, "deleted_chunks": deleted });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if deleted == 0 {
        println!("No chunks found for source '{source_id}'");
    } else {
        println!(
            "{} Deleted {deleted} chunk{} of '{source_id}'",
            style("✓").green(),
            if deleted == 1 { "" } else { "s" }
        );
    }

    Ok(())
}

/// Handle list command
pub async fn handle_list(system: &RagSystem, limit: usize, offset: usize, json: bool) -> Result<()> {
    let documents = system
        .list_documents(limit, offset)
        .await
        .context("Failed to list documents")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&documents)?);
    } else {
        if documents.is_empty() {
            println!("No documents found.");
            return Ok(());
        }

        println!("{}", TableFormatter::new().format_documents(&documents));
        println!(
            "\nShowing chunks {}-{}",
            offset + 1,
            offset + documents.len()
        );
    }

    Ok(())
}
