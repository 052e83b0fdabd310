//! Fixtures shared by the unit tests.

use std::sync::Arc;

use papyrus_llm::any::AnyProvider;
use papyrus_llm::mock::MockProvider;
use papyrus_llm::provider::{EmbedFn, EmbedFuture};
use papyrus_memory::{DocumentStore, InMemoryVectorStore};
use papyrus_papers::PaperRecord;

pub(crate) fn paper(id: &str, title: &str, summary: &str) -> PaperRecord {
    PaperRecord::new(id, title, "arxiv")
        .with_authors(["Ada Lovelace", "Alan Turing"])
        .with_summary(summary)
        .with_published("2023-01-28")
}

/// In-memory store with word-hash embeddings; the mock counts embed calls.
pub(crate) async fn hashed_store(papers: &[PaperRecord]) -> (Arc<DocumentStore>, MockProvider) {
    let mock = MockProvider::default().with_hashed_embeddings();
    let store = DocumentStore::new(
        Box::new(InMemoryVectorStore::new()),
        AnyProvider::Mock(mock.clone()).embed_fn(),
    );
    store.add(papers).await.unwrap();
    (Arc::new(store), mock)
}

/// Paper A scores 0.9 and paper B 0.7 against every query.
pub(crate) async fn ranked_store() -> Arc<DocumentStore> {
    static TABLE: &[(&str, [f32; 2])] = &[
        ("beta abstract", [0.7, 0.714_142_8]),
        ("alpha abstract", [0.9, 0.435_889_9]),
    ];
    let embed: EmbedFn = Arc::new(|text: &str| -> EmbedFuture {
        let v = TABLE
            .iter()
            .find(|(t, _)| *t == text)
            .map_or(vec![1.0, 0.0], |(_, v)| v.to_vec());
        Box::pin(async move { Ok(v) })
    });
    let store = DocumentStore::new(Box::new(InMemoryVectorStore::new()), embed);
    store
        .add(&[
            paper("arxiv:0002.0002", "B", "beta abstract"),
            paper("arxiv:0001.0001", "A", "alpha abstract"),
        ])
        .await
        .unwrap();
    Arc::new(store)
}
