//! Router fixtures over the mock provider, mock source and in-memory store.

use std::sync::Arc;

use papyrus_core::{Assistant, PromptManager};
use papyrus_llm::any::AnyProvider;
use papyrus_llm::mock::MockProvider;
use papyrus_memory::{DocumentStore, InMemoryVectorStore};
use papyrus_papers::mock::MockSource;
use papyrus_papers::{PaperLoader, PaperRecord};

pub(crate) fn paper(id: &str, title: &str, summary: &str) -> PaperRecord {
    PaperRecord::new(id, title, "arxiv")
        .with_authors(["Grace Hopper"])
        .with_summary(summary)
        .with_published("2023-01-28")
}

pub(crate) fn assistant(papers: Vec<PaperRecord>) -> Arc<Assistant<AnyProvider>> {
    assistant_with(MockProvider::default(), MockSource::new(papers))
}

pub(crate) fn assistant_with(mock: MockProvider, source: MockSource) -> Arc<Assistant<AnyProvider>> {
    let provider = AnyProvider::Mock(mock.with_hashed_embeddings());
    let store = DocumentStore::new(Box::new(InMemoryVectorStore::new()), provider.embed_fn())
        .with_collection("test_papers");
    Arc::new(Assistant::new(
        provider,
        Arc::new(PaperLoader::new(Arc::new(source))),
        Arc::new(store),
        Arc::new(PromptManager::default()),
    ))
}
