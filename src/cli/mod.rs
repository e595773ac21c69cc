//! Command-line front-end over [`crate::services::RagSystem`].

pub mod commands;
pub mod output;
pub mod types;

pub use types::{Cli, Commands, FormatArg};

use anyhow::Result;
use console::style;

use crate::services::RagSystem;

/// Run one parsed command against `system`.
pub async fn execute(command: Commands, system: &RagSystem, json: bool) -> Result<()> {
    match command {
        Commands::Add {
            file,
            source_id,
            title,
            category,
        } => commands::document::handle_add(system, &file, source_id, title, category, json).await,
        Commands::Search { query, limit, filter } => {
            commands::search::handle_search(system, &query, limit, filter.as_deref(), json).await
        }
        Commands::Context { query, limit, raw } => {
            commands::search::handle_context(system, &query, limit, raw, json).await
        }
        Commands::Delete { source_id } => commands::document::handle_delete(system, &source_id, json).await,
        Commands::List { limit, offset } => commands::document::handle_list(system, limit, offset, json).await,
        Commands::Export { format, output } => {
            commands::transfer::handle_export(system, format, output.as_deref(), json).await
        }
        Commands::Import { file, format } => commands::transfer::handle_import(system, &file, format, json).await,
        Commands::Stats => commands::status::handle_stats(system, json).await,
        Commands::Health => commands::status::handle_health(system, json).await,
    }
}

/// Print `err` with its cause chain and exit with status 1.
pub fn handle_error(err: &anyhow::Error, json: bool) -> ! {
    if json {
        let causes: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let output = serde_json::json!({ "error": err.to_string(), "causes": causes });
        eprintln!("{output}");
    } else {
        eprintln!("{} {err}", style("Error:").red().bold());
        for cause in err.chain().skip(1) {
            eprintln!("  {} {cause}", style("caused by:").dim());
        }
    }
    std::process::exit(1)
}
