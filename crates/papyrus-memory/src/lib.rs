//! Document store over interchangeable vector index backends.

pub mod document_store;
pub mod error;
pub mod in_memory_store;
pub mod qdrant_ops;
pub mod sqlite;
pub mod types;
pub mod vector_store;

pub use document_store::DocumentStore;
pub use error::MemoryError;
pub use in_memory_store::InMemoryVectorStore;
pub use qdrant_ops::QdrantOps;
pub use sqlite::SqliteVectorStore;
pub use types::{IndexedChunk, ScoredChunk, StoreStats};
pub use vector_store::{
    FieldCondition, ScoredVectorPoint, VectorFilter, VectorPoint, VectorStore, VectorStoreError,
};
