//! Composition of the research components and free-text dispatch.

use std::sync::Arc;

use papyrus_llm::provider::LlmProvider;
use papyrus_memory::{DocumentStore, StoreStats};
use papyrus_papers::{PaperLoader, PaperRecord};
use serde::{Deserialize, Serialize};

use crate::citation::CitationFormatter;
use crate::config::Config;
use crate::error::AssistantError;
use crate::prompts::PromptManager;
use crate::rag::{RagGenerator, RetrievalResult};
use crate::router::{Intent, classify};
use crate::summarizer::{PaperSummary, Summarizer, SummaryOptions};

pub const MISSING_PAPER_ID: &str = "Please provide a paper ID or specific paper to summarize";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub query: String,
    pub papers: Vec<PaperRecord>,
    pub total: usize,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexFailure {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexReport {
    /// Chunk ids written, in input order of the papers that loaded.
    pub indexed: Vec<String>,
    pub failed: Vec<IndexFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoutePayload {
    Search(SearchResults),
    Answer(RetrievalResult),
    Summary(PaperSummary),
    /// Summarize request without a recognizable id: search results instead.
    NeedsPaperId {
        message: String,
        results: SearchResults,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDecision {
    pub intent: Intent,
    pub agent: String,
    pub result: RoutePayload,
}

/// Every component, built once and shared by the API surfaces.
pub struct Assistant<P> {
    loader: Arc<PaperLoader>,
    store: Arc<DocumentStore>,
    rag: RagGenerator<P>,
    summarizer: Summarizer<P>,
    citations: CitationFormatter<P>,
}

impl<P: LlmProvider + Clone> Assistant<P> {
    #[must_use]
    pub fn new(
        provider: P,
        loader: Arc<PaperLoader>,
        store: Arc<DocumentStore>,
        prompts: Arc<PromptManager>,
    ) -> Self {
        Self {
            rag: RagGenerator::new(provider.clone(), Arc::clone(&store), Arc::clone(&prompts)),
            summarizer: Summarizer::new(provider.clone(), Arc::clone(&prompts), Arc::clone(&loader)),
            citations: CitationFormatter::new(provider, prompts),
            loader,
            store,
        }
    }

    /// Like [`Assistant::new`], with the tunables of `config` applied.
    #[must_use]
    pub fn from_config(
        provider: P,
        loader: Arc<PaperLoader>,
        store: Arc<DocumentStore>,
        prompts: Arc<PromptManager>,
        config: &Config,
    ) -> Self {
        let mut assistant = Self::new(provider, loader, store, prompts);
        assistant.rag = assistant
            .rag
            .with_top_k(config.rag.top_k)
            .with_context_chars(config.rag.context_chars);
        assistant.summarizer = assistant.summarizer.with_content_limits(
            config.summarizer.full_content_chars,
            config.summarizer.brief_content_chars,
        );
        assistant.citations = assistant.citations.with_llm(config.citation.use_llm);
        assistant
    }
}

impl<P: LlmProvider> Assistant<P> {
    #[must_use]
    pub fn rag(&self) -> &RagGenerator<P> {
        &self.rag
    }

    #[must_use]
    pub fn summarizer(&self) -> &Summarizer<P> {
        &self.summarizer
    }

    #[must_use]
    pub fn citations(&self) -> &CitationFormatter<P> {
        &self.citations
    }

    #[must_use]
    pub fn loader(&self) -> &PaperLoader {
        &self.loader
    }

    #[must_use]
    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Search the paper repository.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for rejected queries (no network call), `Upstream` otherwise.
    pub async fn search(
        &self,
        query: &str,
        max_results: Option<usize>,
    ) -> Result<SearchResults, AssistantError> {
        let papers = self.loader.search(query, max_results).await?;
        Ok(SearchResults {
            query: query.trim().to_owned(),
            total: papers.len(),
            papers,
            source: self.loader.source_name().to_owned(),
        })
    }

    /// # Errors
    ///
    /// `InvalidInput` for malformed ids, `NotFound`, or `Upstream`.
    pub async fn paper(&self, id: &str) -> Result<PaperRecord, AssistantError> {
        Ok(self.loader.load_by_id(id).await?)
    }

    /// Load the given papers and add the ones that resolved to the document store.
    ///
    /// # Errors
    ///
    /// Fails as a whole only when writing to the store fails; papers that could
    /// not be loaded are listed in [`IndexReport::failed`].
    pub async fn index_papers(&self, ids: &[String]) -> Result<IndexReport, AssistantError> {
        let mut papers = Vec::new();
        let mut failed = Vec::new();
        for item in self.loader.load_multiple(ids).await {
            match item.outcome {
                papyrus_papers::ItemOutcome::Ok(paper) => papers.push(paper),
                papyrus_papers::ItemOutcome::Error(error) => {
                    failed.push(IndexFailure { id: item.id, error });
                }
            }
        }
        let indexed = self.store.add(&papers).await?;
        tracing::info!("indexed {} papers, {} failed", indexed.len(), failed.len());
        Ok(IndexReport { indexed, failed })
    }

    /// # Errors
    ///
    /// `Upstream` when the backend cannot be counted.
    pub async fn stats(&self) -> Result<StoreStats, AssistantError> {
        Ok(self.store.stats().await?)
    }

    /// Classify `query` and run the matching component.
    ///
    /// # Errors
    ///
    /// Propagates the error of the dispatched operation.
    pub async fn route(&self, query: &str) -> Result<RouteDecision, AssistantError> {
        let classification = classify(query);
        let intent = classification.intent;
        tracing::info!("routing query to {}", intent.agent());

        let result = match intent {
            Intent::Search => RoutePayload::Search(self.search(query, None).await?),
            Intent::Qa => RoutePayload::Answer(self.rag.answer(query).await?),
            Intent::Summarize => match classification.paper_id {
                Some(id) => RoutePayload::Summary(
                    self.summarizer
                        .summarize_paper(&id, SummaryOptions::default())
                        .await?,
                ),
                None => RoutePayload::NeedsPaperId {
                    message: MISSING_PAPER_ID.to_owned(),
                    results: self.search(query, None).await?,
                },
            },
        };

        Ok(RouteDecision {
            intent,
            agent: intent.agent().to_owned(),
            result,
        })
    }
}

#[cfg(test)]
mod tests {
    use papyrus_llm::mock::MockProvider;
    use papyrus_papers::mock::MockSource;

    use super::*;
    use crate::testing::{hashed_store, paper, ranked_store};

    fn catalog() -> Vec<PaperRecord> {
        vec![
            paper(
                "arxiv:2301.12345",
                "Transformers for Graphs",
                "graph transformers survey",
            ),
            paper(
                "arxiv:1706.03762",
                "Attention Is All You Need",
                "transformers replace recurrence with attention",
            ),
        ]
    }

    fn assistant(
        mock: &MockProvider,
        source: MockSource,
        store: Arc<DocumentStore>,
    ) -> Assistant<MockProvider> {
        Assistant::new(
            mock.clone(),
            Arc::new(PaperLoader::new(Arc::new(source))),
            store,
            Arc::new(PromptManager::default()),
        )
    }

    #[tokio::test]
    async fn route_summarize_with_id() {
        let mock = MockProvider::with_responses(vec!["Graph transformer summary.".into()]);
        let a = assistant(&mock, MockSource::new(catalog()), ranked_store().await);

        let decision = a.route("summarize paper arxiv:2301.12345").await.unwrap();
        assert_eq!(decision.intent, Intent::Summarize);
        assert_eq!(decision.agent, "summarization_agent");
        let RoutePayload::Summary(summary) = decision.result else {
            panic!("expected summary payload");
        };
        assert_eq!(summary.paper_id.as_deref(), Some("arxiv:2301.12345"));
        assert_eq!(summary.summary, "Graph transformer summary.");
    }

    #[tokio::test]
    async fn route_summarize_without_id_searches() {
        let mock = MockProvider::default();
        let source = MockSource::new(catalog());
        let a = assistant(&mock, source.clone(), ranked_store().await);

        let decision = a.route("summary of transformers").await.unwrap();
        let RoutePayload::NeedsPaperId { message, results } = decision.result else {
            panic!("expected search fallback");
        };
        assert_eq!(message, MISSING_PAPER_ID);
        assert_eq!(results.total, 2);
        assert_eq!(source.search_calls(), 1);
        assert_eq!(mock.chat_calls(), 0);
    }

    #[tokio::test]
    async fn route_search() {
        let mock = MockProvider::default();
        let a = assistant(&mock, MockSource::new(catalog()), ranked_store().await);
        let decision = a.route("find papers on graphs").await.unwrap();
        assert_eq!(decision.intent, Intent::Search);
        let RoutePayload::Search(results) = decision.result else {
            panic!("expected search payload");
        };
        assert_eq!(results.source, "mock");
        assert_eq!(results.papers[0].id, "arxiv:2301.12345");
    }

    #[tokio::test]
    async fn route_question_answers_from_index() {
        let mock = MockProvider::with_responses(vec!["Attention weighs tokens.".into()]);
        let a = assistant(&mock, MockSource::new(vec![]), ranked_store().await);
        let decision = a.route("what is attention?").await.unwrap();
        assert_eq!(decision.agent, "qa_agent");
        let RoutePayload::Answer(answer) = decision.result else {
            panic!("expected answer payload");
        };
        assert_eq!(answer.answer, "Attention weighs tokens.");
        assert_eq!(answer.sources.len(), 2);
    }

    #[tokio::test]
    async fn short_search_query_never_reaches_source() {
        let mock = MockProvider::default();
        let source = MockSource::new(catalog());
        let a = assistant(&mock, source.clone(), ranked_store().await);
        assert!(matches!(
            a.search(" ab ", None).await,
            Err(AssistantError::InvalidInput(_))
        ));
        assert_eq!(source.search_calls(), 0);
    }

    #[tokio::test]
    async fn index_reports_partial_failures() {
        let mock = MockProvider::default();
        let (store, _) = hashed_store(&[]).await;
        let a = assistant(&mock, MockSource::new(catalog()), Arc::clone(&store));

        let report = a
            .index_papers(&[
                "arxiv:1706.03762".to_owned(),
                "arxiv:0000.00000".to_owned(),
                "doi:10.1/x".to_owned(),
            ])
            .await
            .unwrap();
        assert_eq!(report.indexed.len(), 1);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.failed[0].id, "arxiv:0000.00000");
        assert_eq!(a.stats().await.unwrap().count, 1);

        let hits = store.search("attention recurrence", 1).await.unwrap();
        assert_eq!(hits[0].chunk.paper_id, "arxiv:1706.03762");
    }

    #[tokio::test]
    async fn serialized_decision_is_tagged() {
        let mock = MockProvider::default();
        let a = assistant(&mock, MockSource::new(catalog()), ranked_store().await);
        let decision = a.route("look for graphs").await.unwrap();
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["intent"], "search");
        assert_eq!(json["agent"], "search_agent");
        assert_eq!(json["result"]["kind"], "search");
        assert_eq!(json["result"]["total"], 2);
    }

    #[tokio::test]
    async fn from_config_applies_tunables() {
        let mut config = Config::default();
        config.rag.top_k = 1;
        let mock = MockProvider::default();
        let a = Assistant::from_config(
            mock.clone(),
            Arc::new(PaperLoader::new(Arc::new(MockSource::new(vec![])))),
            ranked_store().await,
            Arc::new(PromptManager::default()),
            &config,
        );
        assert_eq!(a.rag().top_k(), 1);
        assert_eq!(a.rag().answer("X").await.unwrap().num_sources, 1);
    }
}
