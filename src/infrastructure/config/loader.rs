use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::{Config, VectorStoreType};

/// Project config file, created by hand or by the CLI.
pub const PROJECT_CONFIG_PATH: &str = ".ragcore/config.yaml";
/// Local overrides, usually kept out of version control.
pub const LOCAL_CONFIG_PATH: &str = ".ragcore/local.yaml";
/// Prefix for environment overrides; `__` separates nested keys.
pub const ENV_PREFIX: &str = "RAGCORE_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid embedding dimension: {0}. Must be at least 1")]
    InvalidDimension(usize),

    #[error("Invalid chunking configuration: {0}")]
    InvalidChunking(String),

    #[error("Invalid embedding {field}: must be at least 1")]
    InvalidEmbeddingLimit { field: &'static str },

    #[error("Collection name cannot be empty")]
    EmptyCollectionName,

    #[error("The {0} vector store requires {1}")]
    MissingStoreSetting(VectorStoreType, &'static str),

    #[error("Invalid retrieval top_k: {0}. Must be at least 1")]
    InvalidTopK(usize),

    #[error("Invalid retrieval min_score: {0}. Cannot be negative")]
    InvalidMinScore(f32),

    #[error("Invalid retrieval {field}: {value}. Must be between 0 and 1")]
    InvalidRetrievalWeight { field: &'static str, value: f32 },

    #[error("Invalid email limit {field}: must be at least 1")]
    InvalidEmailLimit { field: &'static str },
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .ragcore/config.yaml (project config)
    /// 3. .ragcore/local.yaml (local overrides, optional)
    /// 4. Environment variables (`RAGCORE_*`, e.g. `RAGCORE_VECTOR_STORE__TYPE=sqlite`)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(PROJECT_CONFIG_PATH))
            .merge(Yaml::file(LOCAL_CONFIG_PATH))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file; environment overrides still apply.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let store = &config.vector_store;
        if store.dimension == 0 {
            return Err(ConfigError::InvalidDimension(store.dimension));
        }
        if store.collection_name.trim().is_empty() {
            return Err(ConfigError::EmptyCollectionName);
        }
        match store.store_type {
            VectorStoreType::Sqlite if store.path.is_none() => {
                return Err(ConfigError::MissingStoreSetting(store.store_type, "a database path"));
            }
            VectorStoreType::Chroma if store.base_url.as_deref().is_none_or(str::is_empty) => {
                return Err(ConfigError::MissingStoreSetting(store.store_type, "a base_url"));
            }
            _ => {}
        }

        config
            .chunking
            .validate()
            .map_err(|e| ConfigError::InvalidChunking(e.to_string()))?;

        let embedding = &config.embedding;
        if embedding.batch_size == 0 {
            return Err(ConfigError::InvalidEmbeddingLimit { field: "batch_size" });
        }
        if embedding.max_concurrency == 0 {
            return Err(ConfigError::InvalidEmbeddingLimit {
                field: "max_concurrency",
            });
        }
        if embedding.timeout_secs == 0 {
            return Err(ConfigError::InvalidEmbeddingLimit { field: "timeout_secs" });
        }
        if embedding.requests_per_second == Some(0) {
            return Err(ConfigError::InvalidEmbeddingLimit {
                field: "requests_per_second",
            });
        }

        let retrieval = &config.retrieval;
        if retrieval.top_k == 0 {
            return Err(ConfigError::InvalidTopK(retrieval.top_k));
        }
        if retrieval.min_score.is_nan() || retrieval.min_score < 0.0 {
            return Err(ConfigError::InvalidMinScore(retrieval.min_score));
        }
        if !(0.0..=1.0).contains(&retrieval.diversity_factor) {
            return Err(ConfigError::InvalidRetrievalWeight {
                field: "diversity_factor",
                value: retrieval.diversity_factor,
            });
        }

        let email = &config.email;
        for (field, value) in [
            ("batch_size", email.batch_size),
            ("max_body_bytes", email.max_body_bytes),
            ("max_subject_chars", email.max_subject_chars),
            ("max_recipients", email.max_recipients),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidEmailLimit { field });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::domain::models::{ChunkingMethod, EmbeddingProviderKind};

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r"
embedding:
  provider: openai
  base_url: https://api.openai.com/v1
  model: text-embedding-3-small
vector_store:
  type: sqlite
  path: /tmp/ragcore-test.db
  dimension: 1536
chunking:
  size: 500
  overlap: 50
  method: token
"
        )
        .unwrap();

        let config = temp_env::with_vars_unset(
            ["RAGCORE_VECTOR_STORE__TYPE", "RAGCORE_CHUNKING__SIZE"],
            || ConfigLoader::load_from_file(file.path()),
        )
        .unwrap();

        assert_eq!(config.embedding.provider, EmbeddingProviderKind::OpenAi);
        assert_eq!(config.vector_store.store_type, VectorStoreType::Sqlite);
        assert_eq!(config.vector_store.dimension, 1536);
        assert_eq!(config.chunking.size, 500);
        assert_eq!(config.chunking.method, ChunkingMethod::Token);
        assert_eq!(config.retrieval.top_k, 5);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "retrieval:\n  top_k: 3\n").unwrap();

        let config = temp_env::with_vars(
            [
                ("RAGCORE_RETRIEVAL__TOP_K", Some("9")),
                ("RAGCORE_VECTOR_STORE__COLLECTION_NAME", Some("notes")),
            ],
            || ConfigLoader::load_from_file(file.path()),
        )
        .unwrap();

        assert_eq!(config.retrieval.top_k, 9);
        assert_eq!(config.vector_store.collection_name, "notes");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(ConfigLoader::load_from_file("/nonexistent/ragcore.yaml").is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.logging.level = "chatty".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogLevel(_))
        ));

        let mut config = Config::default();
        config.vector_store.dimension = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidDimension(0))
        ));

        let mut config = Config::default();
        config.vector_store.store_type = VectorStoreType::Sqlite;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::MissingStoreSetting(VectorStoreType::Sqlite, _))
        ));

        let mut config = Config::default();
        config.chunking.overlap = config.chunking.size;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidChunking(_))
        ));

        let mut config = Config::default();
        config.retrieval.diversity_factor = 1.5;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidRetrievalWeight { field: "diversity_factor", .. })
        ));

        let mut config = Config::default();
        config.email.max_recipients = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidEmailLimit { field: "max_recipients" })
        ));
    }

    #[test]
    fn test_memory_store_needs_no_location() {
        let mut config = Config::default();
        config.vector_store.store_type = VectorStoreType::Memory;
        config.vector_store.base_url = None;
        assert!(ConfigLoader::validate(&config).is_ok());
    }
}
