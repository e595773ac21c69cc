//! `export` and `import` commands.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use crate::cli::output::{create_spinner, ProgressBarExt};
use crate::cli::types::FormatArg;
use crate::services::{RagSystem, TransferFormat};

/// Format from the flag, else from the file extension, else JSON.
pub fn resolve_format(flag: Option<FormatArg>, file: &Path) -> TransferFormat {
    flag.map_or_else(
        || {
            file.extension()
                .and_then(|ext| ext.to_str())
                .and_then(|ext| ext.parse().ok())
                .unwrap_or_default()
        },
        TransferFormat::from,
    )
}

/// Handle export command
pub async fn handle_export(
    system: &RagSystem,
    format: FormatArg,
    output: Option<&Path>,
    json: bool,
) -> Result<()> {
    let format = TransferFormat::from(format);
    let quiet = json || output.is_none();
    let spinner = create_spinner("Exporting documents", quiet);
    let data = system
        .export_documents(format)
        .await
        .context("Failed to export documents")?;

    match output {
        Some(path) => {
            tokio::fs::write(path, &data)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if json {
                let summary = serde_json::json!({
                    "format": format.to_string(),
                    "output": path.display().to_string(),
                    "bytes": data.len(),
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                spinner.finish_success(format!("Exported to {} ({format})", path.display()));
            }
        }
        None => {
            spinner.finish_silently();
            print!("{data}");
        }
    }

    Ok(())
}

/// Handle import command
pub async fn handle_import(
    system: &RagSystem,
    file: &Path,
    format: Option<FormatArg>,
    json: bool,
) -> Result<()> {
    let format = resolve_format(format, file);
    let data = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let spinner = create_spinner(format!("Importing {}", file.display()), json);
    let report = system
        .import_documents(&data, format)
        .await
        .context("Failed to import documents")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.failed == 0 {
        spinner.finish_success(format!("Imported {} chunks", report.imported));
    } else {
        spinner.finish_warning(format!(
            "Imported {} chunks, {} failed",
            report.imported, report.failed
        ));
        for (record, error) in &report.errors {
            println!("  {} {record}: {error}", style("✗").red());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_resolve_format() {
        assert_eq!(resolve_format(None, &PathBuf::from("dump.csv")), TransferFormat::Csv);
        assert_eq!(resolve_format(None, &PathBuf::from("dump.CSV")), TransferFormat::Csv);
        assert_eq!(resolve_format(None, &PathBuf::from("dump")), TransferFormat::Json);
        assert_eq!(
            resolve_format(Some(FormatArg::Json), &PathBuf::from("dump.csv")),
            TransferFormat::Json
        );
    }
}
