use std::collections::{BTreeMap, HashMap};

use papyrus_llm::provider::EmbedFn;
use papyrus_papers::PaperRecord;
use uuid::Uuid;

use crate::error::MemoryError;
use crate::types::{IndexedChunk, ScoredChunk, StoreStats};
use crate::vector_store::{ScoredVectorPoint, VectorFilter, VectorPoint, VectorStore};

pub const DEFAULT_COLLECTION: &str = "papyrus_papers";

const CHUNK_NAMESPACE: Uuid = Uuid::from_bytes([
    0x3b, 0x9e, 0x51, 0x7c, 0x2d, 0x44, 0x4f, 0x0a, 0x9c, 0x61, 0x5e, 0x8f, 0x12, 0xa7, 0xd0, 0x46,
]);

/// Longest text sent to the embedding model and kept in the payload, in chars.
pub const MAX_CHUNK_CHARS: usize = 8000;

const METADATA_KEYS: &[&str] = &["title", "authors", "source", "id", "published"];

/// Deterministic chunk id for a paper; re-adding the same paper overwrites its chunk.
#[must_use]
pub fn chunk_id_for(paper_id: &str) -> String {
    Uuid::new_v5(&CHUNK_NAMESPACE, paper_id.as_bytes()).to_string()
}

/// Embeds papers and serves similarity search over one collection.
pub struct DocumentStore {
    store: Box<dyn VectorStore>,
    embed: EmbedFn,
    collection: String,
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("backend", &self.store.name())
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

impl DocumentStore {
    #[must_use]
    pub fn new(store: Box<dyn VectorStore>, embed: EmbedFn) -> Self {
        Self {
            store,
            embed,
            collection: DEFAULT_COLLECTION.into(),
        }
    }

    #[must_use]
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    #[must_use]
    pub fn backend(&self) -> &str {
        self.store.name()
    }

    /// Embed and upsert one chunk per paper, returning chunk ids in input order.
    ///
    /// All embeddings are computed before anything is written.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidInput`] for papers without an id or for
    /// inconsistent embedding sizes, or an embedding/backend error.
    pub async fn add(&self, papers: &[PaperRecord]) -> Result<Vec<String>, MemoryError> {
        if papers.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(p) = papers.iter().find(|p| p.id.trim().is_empty()) {
            return Err(MemoryError::InvalidInput(format!(
                "paper '{}' has no id",
                p.title
            )));
        }

        let mut points = Vec::with_capacity(papers.len());
        for paper in papers {
            let text = head_chars(paper.content(), MAX_CHUNK_CHARS);
            let vector = (self.embed)(text).await?;
            points.push(paper_point(paper, text, vector));
        }

        let dim = points[0].vector.len();
        if dim == 0 || points.iter().any(|p| p.vector.len() != dim) {
            return Err(MemoryError::InvalidInput(
                "embedding provider returned inconsistent vector sizes".into(),
            ));
        }

        self.store
            .ensure_collection(&self.collection, u64::try_from(dim)?)
            .await?;
        let ids: Vec<String> = points.iter().map(|p| p.id.clone()).collect();
        self.store.upsert(&self.collection, points).await?;

        tracing::info!(
            "indexed {} papers into {} ({})",
            ids.len(),
            self.collection,
            self.store.name()
        );
        Ok(ids)
    }

    /// Top-`k` chunks for `query`, best first.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::InvalidInput`] when `k` is zero or the query is
    /// blank, or an embedding/backend error.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>, MemoryError> {
        self.search_filtered(query, k, None).await
    }

    /// Like [`DocumentStore::search`], restricted to chunks from one source.
    ///
    /// # Errors
    ///
    /// Same as [`DocumentStore::search`].
    pub async fn search_source(
        &self,
        query: &str,
        k: usize,
        source: &str,
    ) -> Result<Vec<ScoredChunk>, MemoryError> {
        self.search_filtered(query, k, Some(VectorFilter::must_equal("source", source)))
            .await
    }

    async fn search_filtered(
        &self,
        query: &str,
        k: usize,
        filter: Option<VectorFilter>,
    ) -> Result<Vec<ScoredChunk>, MemoryError> {
        if k == 0 {
            return Err(MemoryError::InvalidInput("k must be at least 1".into()));
        }
        let query = query.trim();
        if query.is_empty() {
            return Err(MemoryError::InvalidInput("query must not be empty".into()));
        }
        if !self.store.collection_exists(&self.collection).await? {
            tracing::debug!("collection {} not created yet", self.collection);
            return Ok(Vec::new());
        }

        let vector = (self.embed)(query).await?;
        let hits = self
            .store
            .search(&self.collection, vector, u64::try_from(k)?, filter)
            .await?;
        tracing::debug!("retrieved {} chunks for query", hits.len());
        Ok(hits.into_iter().map(point_to_chunk).collect())
    }

    /// # Errors
    ///
    /// Returns a backend error if deletion fails.
    pub async fn delete(&self, chunk_ids: &[String]) -> Result<(), MemoryError> {
        if chunk_ids.is_empty() || !self.store.collection_exists(&self.collection).await? {
            return Ok(());
        }
        self.store
            .delete_by_ids(&self.collection, chunk_ids.to_vec())
            .await?;
        tracing::info!("deleted {} chunks from {}", chunk_ids.len(), self.collection);
        Ok(())
    }

    /// Delete the chunks owned by the given papers.
    ///
    /// # Errors
    ///
    /// Returns a backend error if deletion fails.
    pub async fn delete_papers(&self, paper_ids: &[String]) -> Result<(), MemoryError> {
        let ids: Vec<String> = paper_ids.iter().map(|id| chunk_id_for(id)).collect();
        self.delete(&ids).await
    }

    /// # Errors
    ///
    /// Returns a backend error if the count fails.
    pub async fn stats(&self) -> Result<StoreStats, MemoryError> {
        Ok(StoreStats {
            count: self.store.count(&self.collection).await?,
            backend: self.store.name().to_string(),
            collection: self.collection.clone(),
        })
    }
}

fn head_chars(s: &str, max: usize) -> &str {
    s.char_indices().nth(max).map_or(s, |(idx, _)| &s[..idx])
}

fn paper_point(paper: &PaperRecord, text: &str, vector: Vec<f32>) -> VectorPoint {
    let mut payload: HashMap<String, serde_json::Value> = HashMap::from([
        ("paper_id".to_owned(), serde_json::json!(paper.id)),
        ("text".to_owned(), serde_json::json!(text)),
        ("title".to_owned(), serde_json::json!(paper.title)),
        ("authors".to_owned(), serde_json::json!(paper.authors_joined())),
        ("source".to_owned(), serde_json::json!(paper.source)),
        ("id".to_owned(), serde_json::json!(paper.id)),
    ]);
    if let Some(published) = &paper.published {
        payload.insert("published".to_owned(), serde_json::json!(published));
    }
    VectorPoint {
        id: chunk_id_for(&paper.id),
        vector,
        payload,
    }
}

fn point_to_chunk(point: ScoredVectorPoint) -> ScoredChunk {
    let text_field = |key: &str| {
        point
            .payload
            .get(key)
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
    };
    let metadata: BTreeMap<String, String> = METADATA_KEYS
        .iter()
        .filter_map(|k| text_field(k).map(|v| ((*k).to_string(), v)))
        .collect();

    ScoredChunk {
        chunk: IndexedChunk {
            paper_id: text_field("paper_id").unwrap_or_default(),
            text: text_field("text").unwrap_or_default(),
            metadata,
            id: point.id,
        },
        score: point.score,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use papyrus_llm::any::AnyProvider;
    use papyrus_llm::mock::MockProvider;
    use papyrus_llm::provider::EmbedFuture;

    use super::*;
    use crate::in_memory_store::InMemoryVectorStore;
    use crate::sqlite::SqliteVectorStore;

    fn paper(id: &str, title: &str, summary: &str) -> PaperRecord {
        PaperRecord::new(id, title, "arxiv")
            .with_authors(["Ada Lovelace", "Alan Turing"])
            .with_summary(summary)
            .with_published("2023-01-28")
    }

    fn hashed() -> (EmbedFn, MockProvider) {
        let mock = MockProvider::default().with_hashed_embeddings();
        (AnyProvider::Mock(mock.clone()).embed_fn(), mock)
    }

    /// Fixed vectors keyed by exact text; anything else embeds to the query axis.
    fn table_embed(table: &'static [(&'static str, [f32; 2])]) -> EmbedFn {
        Arc::new(move |text: &str| -> EmbedFuture {
            let v = table
                .iter()
                .find(|(t, _)| *t == text)
                .map_or(vec![1.0, 0.0], |(_, v)| v.to_vec());
            Box::pin(async move { Ok(v) })
        })
    }

    fn memory_store(embed: EmbedFn) -> DocumentStore {
        DocumentStore::new(Box::new(InMemoryVectorStore::new()), embed)
    }

    #[tokio::test]
    async fn long_full_text_is_capped_before_embedding() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let embed: EmbedFn = Arc::new(move |text: &str| -> EmbedFuture {
            recorder.lock().unwrap().push(text.chars().count());
            Box::pin(async { Ok(vec![1.0, 0.0]) })
        });
        let store = memory_store(embed);
        let body = "é".repeat(MAX_CHUNK_CHARS + 500);
        let long = paper("arxiv:2301.00001", "Long", "abstract").with_full_text(body);

        store.add(&[long]).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), [MAX_CHUNK_CHARS]);

        let hits = store.search("anything", 1).await.unwrap();
        assert_eq!(hits[0].chunk.text.chars().count(), MAX_CHUNK_CHARS);
    }

    #[test]
    fn chunk_id_is_deterministic_uuid() {
        let a = chunk_id_for("arxiv:2301.12345");
        assert_eq!(a, chunk_id_for("arxiv:2301.12345"));
        assert_ne!(a, chunk_id_for("arxiv:2301.12346"));
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[tokio::test]
    async fn add_empty_skips_embedding() {
        let (embed, mock) = hashed();
        let store = memory_store(embed);
        assert!(store.add(&[]).await.unwrap().is_empty());
        assert_eq!(mock.embed_calls(), 0);
    }

    #[tokio::test]
    async fn add_then_search_returns_metadata() {
        let (embed, _) = hashed();
        let store = memory_store(embed);
        let ids = store
            .add(&[
                paper("arxiv:1", "Graph neural networks", "message passing on graphs"),
                paper("arxiv:2", "Protein folding", "structure prediction of proteins"),
            ])
            .await
            .unwrap();
        assert_eq!(ids, [chunk_id_for("arxiv:1"), chunk_id_for("arxiv:2")]);

        let hits = store.search("protein structure prediction", 2).await.unwrap();
        let top = &hits[0].chunk;
        assert_eq!(top.paper_id, "arxiv:2");
        assert_eq!(top.text, "structure prediction of proteins");
        assert_eq!(top.meta("title"), "Protein folding");
        assert_eq!(top.meta("authors"), "Ada Lovelace, Alan Turing");
        assert_eq!(top.meta("source"), "arxiv");
        assert_eq!(top.meta("id"), "arxiv:2");
        assert_eq!(top.meta("published"), "2023-01-28");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn readding_overwrites_instead_of_duplicating() {
        let (embed, _) = hashed();
        let store = memory_store(embed);
        store.add(&[paper("arxiv:1", "Old", "old text")]).await.unwrap();
        store.add(&[paper("arxiv:1", "New", "new text")]).await.unwrap();
        assert_eq!(store.stats().await.unwrap().count, 1);
        let hits = store.search("new text", 5).await.unwrap();
        assert_eq!(hits[0].chunk.meta("title"), "New");
    }

    #[tokio::test]
    async fn search_on_missing_collection_is_empty() {
        let (embed, mock) = hashed();
        let store = memory_store(embed);
        assert!(store.search("anything at all", 5).await.unwrap().is_empty());
        assert_eq!(mock.embed_calls(), 0);
    }

    #[tokio::test]
    async fn search_rejects_zero_k_and_blank_query() {
        let (embed, _) = hashed();
        let store = memory_store(embed);
        assert!(matches!(
            store.search("query", 0).await,
            Err(MemoryError::InvalidInput(_))
        ));
        assert!(matches!(
            store.search("   ", 3).await,
            Err(MemoryError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn embedding_failure_writes_nothing() {
        let embed: EmbedFn = Arc::new(|text: &str| -> EmbedFuture {
            let fail = text == "b";
            Box::pin(async move {
                if fail {
                    Err(papyrus_llm::LlmError::Other("embedding backend down".into()))
                } else {
                    Ok(vec![1.0, 0.0])
                }
            })
        });
        let store = memory_store(embed);
        let err = store
            .add(&[paper("arxiv:1", "A", "a"), paper("arxiv:2", "B", "b")])
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::Embedding(_)));
        assert_eq!(store.stats().await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn paper_without_id_rejected() {
        let (embed, mock) = hashed();
        let store = memory_store(embed);
        let err = store.add(&[paper(" ", "T", "s")]).await.unwrap_err();
        assert!(matches!(err, MemoryError::InvalidInput(_)));
        assert_eq!(mock.embed_calls(), 0);
    }

    #[tokio::test]
    async fn results_descend_by_score() {
        static TABLE: &[(&str, [f32; 2])] = &[("low", [0.7, 0.714_142_8]), ("high", [0.9, 0.435_889_9])];
        let store = memory_store(table_embed(TABLE));
        store
            .add(&[paper("arxiv:b", "B", "low"), paper("arxiv:a", "A", "high")])
            .await
            .unwrap();
        let hits = store.search("question", 5).await.unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.chunk.paper_id.as_str()).collect();
        assert_eq!(ids, ["arxiv:a", "arxiv:b"]);
        assert!((hits[0].score - 0.9).abs() < 1e-4);
        assert!((hits[1].score - 0.7).abs() < 1e-4);
    }

    #[tokio::test]
    async fn delete_papers_removes_chunks() {
        let (embed, _) = hashed();
        let store = memory_store(embed);
        store
            .add(&[paper("arxiv:1", "One", "one"), paper("arxiv:2", "Two", "two")])
            .await
            .unwrap();
        store.delete_papers(&["arxiv:1".into()]).await.unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.backend, "memory");
        assert_eq!(stats.collection, DEFAULT_COLLECTION);
    }

    #[tokio::test]
    async fn search_source_filters() {
        let (embed, _) = hashed();
        let store = memory_store(embed);
        let mut other = paper("pubmed:1", "Neural nets", "neural nets");
        other.source = "pubmed".into();
        store
            .add(&[paper("arxiv:1", "Neural nets", "neural nets"), other])
            .await
            .unwrap();
        let hits = store.search_source("neural nets", 5, "pubmed").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.paper_id, "pubmed:1");
    }

    #[tokio::test]
    async fn sqlite_backend_behaves_the_same() {
        let (embed, _) = hashed();
        let backend = SqliteVectorStore::new(":memory:").await.unwrap();
        let store = DocumentStore::new(Box::new(backend), embed).with_collection("test");
        store
            .add(&[paper("arxiv:1", "Graph neural networks", "graphs")])
            .await
            .unwrap();
        let hits = store.search("graphs", 1).await.unwrap();
        assert_eq!(hits[0].chunk.paper_id, "arxiv:1");
        let stats = store.stats().await.unwrap();
        assert_eq!((stats.count, stats.backend.as_str()), (1, "sqlite"));
    }
}
