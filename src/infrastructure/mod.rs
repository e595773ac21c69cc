//! Infrastructure layer module
//!
//! Cross-cutting machinery and in-process implementations of the domain ports:
//! - Configuration management
//! - Logging infrastructure
//! - Retry with exponential backoff
//! - Document chunking and the in-memory and adaptive vector stores

pub mod config;
pub mod logging;
pub mod retry;
pub mod vector;
