#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("database error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("Qdrant error: {0}")]
    Qdrant(#[from] Box<qdrant_client::QdrantError>),

    #[error("vector store error: {0}")]
    VectorStore(#[from] crate::vector_store::VectorStoreError),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("embedding failed: {0}")]
    Embedding(#[from] papyrus_llm::LlmError),

    #[error("integer conversion: {0}")]
    IntConversion(#[from] std::num::TryFromIntError),
}
