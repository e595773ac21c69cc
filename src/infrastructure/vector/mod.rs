//! Vector infrastructure components
//!
//! Document chunking plus the storage backends that need no external service:
//! the lexical in-memory store and the adaptive wrapper that fails over to it.

pub mod adaptive_store;
pub mod document_processor;
pub mod memory_store;

pub use adaptive_store::{
    AdaptiveVectorStore, FailoverRecord, HealthReport, HealthStatus, StoreInfo, StoreMode,
};
pub use document_processor::DocumentProcessor;
pub use memory_store::InMemoryVectorStore;
