//! `search` and `context` commands.

use anyhow::{Context, Result};

use crate::cli::output::TableFormatter;
use crate::domain::models::MetadataFilter;
use crate::services::{ContextFormat, ContextOptions, RagSystem};

/// Handle search command
pub async fn handle_search(
    system: &RagSystem,
    query: &str,
    limit: usize,
    filter: Option<&str>,
    json: bool,
) -> Result<()> {
    let results = match filter {
        Some(raw) => {
            let filter = MetadataFilter::parse(raw).context("Invalid --filter")?;
            system.search_with_filter(query, &filter, limit).await
        }
        None => system.search(query, limit).await,
    }
    .context("Search failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else if results.is_empty() {
        println!("No results for '{query}'.");
    } else {
        println!("{}", TableFormatter::new().format_results(&results));
    }

    Ok(())
}

/// Handle context command
pub async fn handle_context(
    system: &RagSystem,
    query: &str,
    limit: usize,
    raw: bool,
    json: bool,
) -> Result<()> {
    let options = ContextOptions {
        limit,
        format: if raw { ContextFormat::Raw } else { ContextFormat::Markdown },
        filter: None,
    };
    let context = system
        .get_context_for_prompt(query, &options)
        .await
        .context("Failed to build context")?;

    if json {
        let output = serde_json::json!({ "query": query, "context": context });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else if context.is_empty() {
        eprintln!("No relevant context for '{query}'.");
    } else {
        println!("{context}");
    }

    Ok(())
}
