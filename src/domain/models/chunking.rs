//! Text chunking domain models
//!
//! Settings that control how the document processor splits text before it is
//! embedded and stored.

use serde::{Deserialize, Serialize};

use crate::domain::errors::{RagError, RagResult};

/// Approximate characters per token used for all token estimates
pub const CHARS_PER_TOKEN: usize = 5;

/// Smallest chunk size accepted by [`ChunkingConfig::validate`]
pub const MIN_CHUNK_SIZE: usize = 100;

/// Largest chunk size accepted by [`ChunkingConfig::validate`]
pub const MAX_CHUNK_SIZE: usize = 10_000;

/// Estimate the number of tokens in `text`
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Strategy used to cut text into chunks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingMethod {
    /// Accumulate whole sentences up to the chunk size
    #[default]
    Sentence,
    /// Word windows sized in estimated tokens
    Token,
    /// Fixed character windows
    Character,
}

impl std::fmt::Display for ChunkingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sentence => write!(f, "sentence"),
            Self::Token => write!(f, "token"),
            Self::Character => write!(f, "character"),
        }
    }
}

impl std::str::FromStr for ChunkingMethod {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sentence" => Ok(Self::Sentence),
            "token" => Ok(Self::Token),
            "character" | "char" => Ok(Self::Character),
            other => Err(RagError::InvalidConfig(format!(
                "unknown chunking method '{other}' (expected sentence, token or character)"
            ))),
        }
    }
}

/// Configuration for document chunking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub size: usize,

    /// Characters shared between consecutive chunks
    pub overlap: usize,

    pub method: ChunkingMethod,

    /// Separator used when re-joining words
    pub separator: String,

    /// Trim leading and trailing whitespace after cleaning
    pub trim_whitespace: bool,

    /// Keep line breaks instead of collapsing all whitespace
    pub preserve_formatting: bool,
}

impl Default for ChunkingConfig {
    /// 1000 characters per chunk with 200 characters of overlap, split on
    /// sentence boundaries
    fn default() -> Self {
        Self {
            size: 1000,
            overlap: 200,
            method: ChunkingMethod::Sentence,
            separator: " ".to_string(),
            trim_whitespace: true,
            preserve_formatting: false,
        }
    }
}

impl ChunkingConfig {
    /// Small chunks for precise retrieval
    pub fn small() -> Self {
        Self {
            size: 400,
            overlap: 50,
            ..Self::default()
        }
    }

    /// Large chunks for broad context
    pub fn large() -> Self {
        Self {
            size: 2000,
            overlap: 300,
            ..Self::default()
        }
    }

    pub fn with_method(mut self, method: ChunkingMethod) -> Self {
        self.method = method;
        self
    }

    /// Distance between the starts of consecutive windows
    pub const fn stride(&self) -> usize {
        self.size.saturating_sub(self.overlap)
    }

    /// Validate the chunking configuration
    pub fn validate(&self) -> RagResult<()> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.size) {
            return Err(RagError::InvalidConfig(format!(
                "chunk size must be between {MIN_CHUNK_SIZE} and {MAX_CHUNK_SIZE}, got {}",
                self.size
            )));
        }

        if self.overlap >= self.size {
            return Err(RagError::InvalidConfig(format!(
                "chunk overlap ({}) must be less than chunk size ({})",
                self.overlap, self.size
            )));
        }

        if self.separator.is_empty() {
            return Err(RagError::InvalidConfig(
                "separator cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
