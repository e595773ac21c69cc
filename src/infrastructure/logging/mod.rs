//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - JSON or pretty console output on stderr
//! - JSON log files with rotation
//! - Secret scrubbing on every sink

pub mod logger;
pub mod secret_scrubbing;

pub use logger::{parse_log_level, LoggerImpl};
pub use secret_scrubbing::{scrub_message, ScrubbingMakeWriter, SecretScrubber};
