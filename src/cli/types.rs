//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::services::TransferFormat;

#[derive(Parser, Debug)]
#[command(name = "ragcore")]
#[command(about = "ragcore - document retrieval for language-model prompts", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file, replacing the project and local config files
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a text file
    Add {
        /// File to read
        file: PathBuf,

        /// Source identifier (defaults to the file path)
        #[arg(short, long)]
        source_id: Option<String>,

        /// Document title (defaults to the file name)
        #[arg(short, long)]
        title: Option<String>,

        /// Document category
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Search stored chunks
    Search {
        /// Query text
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// Metadata filter as JSON, e.g. '{"category": "guide"}'
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Print prompt context for a query
    Context {
        /// Query text
        query: String,

        /// Maximum number of chunks
        #[arg(short, long, default_value = "5")]
        limit: usize,

        /// Chunk contents only, without headers
        #[arg(long)]
        raw: bool,
    },

    /// Delete every chunk of a source
    Delete {
        /// Source identifier
        source_id: String,
    },

    /// List stored chunks
    List {
        /// Maximum number of chunks to display
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Number of chunks to skip
        #[arg(short, long, default_value = "0")]
        offset: usize,
    },

    /// Export all chunks
    Export {
        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: FormatArg,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import chunks from an export file
    Import {
        /// File to read
        file: PathBuf,

        /// Input format (inferred from the file extension when omitted)
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,
    },

    /// Show document counts and backend status
    Stats,

    /// Check backend health
    Health,
}

/// Export and import formats accepted on the command line.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatArg {
    Json,
    Csv,
}

impl From<FormatArg> for TransferFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Json => Self::Json,
            FormatArg::Csv => Self::Csv,
        }
    }
}
