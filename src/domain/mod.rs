//! Domain layer for the ragcore retrieval subsystem
//!
//! This module contains the document model, configuration and the ports that
//! embedding backends and vector stores implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{RagError, RagResult};
