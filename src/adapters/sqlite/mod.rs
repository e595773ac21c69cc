//! SQLite adapters.

pub mod connection;
pub mod vector_store;

pub use connection::{create_memory_pool, create_pool, verify_connection, ConnectionError, PoolConfig};
pub use vector_store::SqliteVectorStore;
