//! Email indexing models

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::EmailConfig;

/// An email message to be indexed for retrieval
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
    pub id: String,

    #[serde(default)]
    pub subject: String,

    #[serde(default)]
    pub from: String,

    #[serde(default)]
    pub to: Vec<String>,

    #[serde(default)]
    pub cc: Vec<String>,

    #[serde(default)]
    pub date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub body: String,

    #[serde(default)]
    pub folder: Option<String>,

    #[serde(default)]
    pub thread_id: Option<String>,
}

impl EmailMessage {
    /// Source id under which the email's chunks are stored
    pub fn source_id(&self) -> String {
        format!("email-{}", self.id)
    }
}

/// Options for [`crate::services::RagSystem::batch_index_emails`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchIndexOptions {
    /// Emails per batch; a failure only affects the batch it happens in
    pub batch_size: usize,
}

impl Default for BatchIndexOptions {
    fn default() -> Self {
        Self::from(&EmailConfig::default())
    }
}

impl From<&EmailConfig> for BatchIndexOptions {
    fn from(config: &EmailConfig) -> Self {
        Self {
            batch_size: config.batch_size,
        }
    }
}

/// Outcome of a batch indexing run
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchIndexReport {
    pub indexed: usize,
    pub failed: usize,
    /// One entry per failed email: `(email id, error)`
    pub errors: Vec<(String, String)>,
    pub time_elapsed: Duration,
}

/// Options for email search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailSearchOptions {
    pub limit: Option<usize>,
    /// Exact sender address
    pub from: Option<String>,
    pub folder: Option<String>,
    /// Inclusive lower bound on the email date
    pub date_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the email date
    pub date_to: Option<DateTime<Utc>>,
}
