pub mod embedding_service;
pub mod rag_system;
pub mod retrieval_service;

pub use embedding_service::{EmbeddingService, EmbeddingServiceConfig, EmbeddingStats};
pub use rag_system::{
    AddedDocument, ContextFormat, ContextOptions, ImportReport, NewDocument, RagStats, RagSystem,
    SystemHealth, TransferFormat,
};
pub use retrieval_service::RetrievalService;
