//! Table output formatting for CLI commands
//!
//! Renders search results, chunk listings and status snapshots with comfy-table.
//! Colors are dropped when `NO_COLOR` is set or the terminal is dumb.

use std::env;

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};

use crate::domain::models::{Document, QueryResult};
use crate::infrastructure::vector::{HealthStatus, StoreMode};
use crate::services::{RagStats, SystemHealth};

/// Table formatter for CLI output
pub struct TableFormatter {
    use_colors: bool,
    max_width: Option<u16>,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    pub const fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self { use_colors, max_width }
    }

    /// Ranked search hits
    pub fn format_results(&self, results: &[QueryResult]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["#", "Score", "Source", "Chunk", "Preview"]));

        for (position, result) in results.iter().enumerate() {
            let metadata = &result.document.metadata;
            let chunk = match (metadata.chunk_index, metadata.total_chunks) {
                (Some(index), Some(total)) => format!("{}/{total}", index + 1),
                _ => "-".to_string(),
            };
            let score = Cell::new(format!("{:.3}", result.score));
            let score = if self.use_colors {
                score.fg(score_color(result.score))
            } else {
                score
            };

            table.add_row(vec![
                Cell::new(position + 1),
                score,
                Cell::new(truncate_text(&metadata.source_id, 30)),
                Cell::new(chunk),
                Cell::new(truncate_text(&single_line(&result.document.content), 60)),
            ]);
        }

        table.to_string()
    }

    /// Stored chunks, one row each
    pub fn format_documents(&self, documents: &[Document]) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["ID", "Source", "Title", "Category", "Preview"]));

        for document in documents {
            let metadata = &document.metadata;
            table.add_row(vec![
                Cell::new(truncate_text(&document.id, 36)),
                Cell::new(truncate_text(&metadata.source_id, 30)),
                Cell::new(metadata.title.as_deref().map_or_else(|| "-".to_string(), |t| truncate_text(t, 30))),
                Cell::new(metadata.category.as_deref().unwrap_or("-")),
                Cell::new(truncate_text(&single_line(&document.content), 50)),
            ]);
        }

        table.to_string()
    }

    /// Two-column summary of [`RagStats`]
    pub fn format_stats(&self, stats: &RagStats) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["Metric", "Value"]));

        let mode = Cell::new(stats.store.mode.as_str());
        let mode = if self.use_colors && stats.store.mode == StoreMode::Fallback {
            mode.fg(Color::Yellow)
        } else {
            mode
        };

        table.add_row(vec![Cell::new("Documents"), Cell::new(stats.documents)]);
        table.add_row(vec![Cell::new("Chunks"), Cell::new(stats.chunks)]);
        table.add_row(vec![Cell::new("Collections"), Cell::new(stats.collections.join(", "))]);
        table.add_row(vec![Cell::new("Active store"), Cell::new(&stats.store.active)]);
        table.add_row(vec![Cell::new("Store mode"), mode]);
        table.add_row(vec![Cell::new("Embedding provider"), Cell::new(&stats.embedding.provider)]);
        table.add_row(vec![Cell::new("Dimension"), Cell::new(stats.embedding.dimension)]);
        table.add_row(vec![
            Cell::new("Embedding failures"),
            Cell::new(format!(
                "{} of {} requests ({} fallback vectors)",
                stats.embedding.failures, stats.embedding.requests, stats.embedding.fallback_vectors
            )),
        ]);
        table.add_row(vec![
            Cell::new("Chunking"),
            Cell::new(format!(
                "{:?}, size {}, overlap {}",
                stats.chunking.method, stats.chunking.size, stats.chunking.overlap
            )),
        ]);

        table.to_string()
    }

    /// Health summary with the store probe message, if any
    pub fn format_health(&self, health: &SystemHealth) -> String {
        let mut table = self.create_base_table();
        table.set_header(header(&["Component", "Status", "Detail"]));

        table.add_row(vec![
            Cell::new("System"),
            self.status_cell(health.status),
            Cell::new(if health.initialized { "initialized" } else { "not initialized" }),
        ]);
        table.add_row(vec![
            Cell::new("Vector store"),
            self.status_cell(health.store.status),
            Cell::new(format!(
                "{}{}",
                health.store.backend,
                health.store.message.as_deref().map(|m| format!(": {m}")).unwrap_or_default()
            )),
        ]);
        let embedding_status = if health.embedding.is_degraded() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };
        table.add_row(vec![
            Cell::new("Embeddings"),
            self.status_cell(embedding_status),
            Cell::new(format!(
                "{} ({} failures)",
                health.embedding.provider, health.embedding.failures
            )),
        ]);

        table.to_string()
    }

    fn status_cell(&self, status: HealthStatus) -> Cell {
        let cell = Cell::new(status.as_str());
        if self.use_colors {
            cell.fg(status_color(status))
        } else {
            cell
        }
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(width);
        }

        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(label).add_attribute(Attribute::Bold))
        .collect()
}

fn supports_color() -> bool {
    if env::var_os("NO_COLOR").is_some() {
        return false;
    }
    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}

fn score_color(score: f32) -> Color {
    if score >= 0.7 {
        Color::Green
    } else if score >= 0.4 {
        Color::Yellow
    } else {
        Color::DarkGrey
    }
}

const fn status_color(status: HealthStatus) -> Color {
    match status {
        HealthStatus::Healthy => Color::Green,
        HealthStatus::Degraded => Color::Yellow,
        HealthStatus::Error => Color::Red,
    }
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Shorten `text` to at most `max_chars` characters, marking the cut with `...`
pub(crate) fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
