//! Retrieval-augmented question answering over the document store.

use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use papyrus_llm::provider::LlmProvider;
use papyrus_memory::{DocumentStore, ScoredChunk};
use papyrus_papers::BatchItem;
use serde::{Deserialize, Serialize};

use crate::error::AssistantError;
use crate::prompts::{PromptManager, QA_PROMPT};
use crate::text::{sanitize_question, truncate_chars};

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_CONTEXT_CHARS: usize = 500;

/// Generated answer chunks in generation order; dropping it stops generation.
pub type AnswerStream = Pin<Box<dyn Stream<Item = Result<String, AssistantError>> + Send>>;

/// Metadata of a retrieved paper, as cited alongside an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub authors: String,
    pub source: String,
    pub id: String,
}

impl Source {
    fn from_chunk(hit: &ScoredChunk) -> Self {
        let field = |key: &str, fallback: &str| {
            let v = hit.chunk.meta(key);
            if v.is_empty() { fallback.to_owned() } else { v.to_owned() }
        };
        Self {
            title: field("title", "Unknown Title"),
            authors: field("authors", "Unknown Authors"),
            source: field("source", "unknown"),
            id: field("id", &hit.chunk.paper_id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub answer: String,
    pub question: String,
    pub sources: Vec<Source>,
    pub num_sources: usize,
}

pub struct StreamingAnswer {
    pub question: String,
    pub sources: Vec<Source>,
    pub chunks: AnswerStream,
}

impl std::fmt::Debug for StreamingAnswer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingAnswer")
            .field("question", &self.question)
            .field("sources", &self.sources)
            .finish_non_exhaustive()
    }
}

pub struct RagGenerator<P> {
    provider: P,
    store: Arc<DocumentStore>,
    prompts: Arc<PromptManager>,
    top_k: usize,
    context_chars: usize,
}

impl<P: LlmProvider> RagGenerator<P> {
    #[must_use]
    pub fn new(provider: P, store: Arc<DocumentStore>, prompts: Arc<PromptManager>) -> Self {
        Self {
            provider,
            store,
            prompts,
            top_k: DEFAULT_TOP_K,
            context_chars: DEFAULT_CONTEXT_CHARS,
        }
    }

    #[must_use]
    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    #[must_use]
    pub fn with_context_chars(mut self, chars: usize) -> Self {
        self.context_chars = chars;
        self
    }

    #[must_use]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    #[must_use]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Answer `question` from the top-k retrieved papers.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a blank question, `Upstream` when retrieval fails and
    /// `Generation` when the completion provider fails or returns nothing.
    pub async fn answer(&self, question: &str) -> Result<RetrievalResult, AssistantError> {
        let question = sanitize_question(question)?;
        let preview = truncate_chars(&question, 50);
        tracing::info!("answering question: '{preview}'");

        let (prompt, sources) = self.prepare(&question).await?;
        let answer = self.provider.complete(&prompt).await.map_err(|e| {
            tracing::error!("completion failed: {e}");
            AssistantError::from(e)
        })?;
        if answer.trim().is_empty() {
            return Err(AssistantError::Generation(format!(
                "{} returned an empty answer",
                self.provider.name()
            )));
        }

        tracing::info!("generated answer with {} sources", sources.len());
        Ok(RetrievalResult {
            answer,
            question,
            num_sources: sources.len(),
            sources,
        })
    }

    /// Same retrieval and prompt as [`RagGenerator::answer`], generated incrementally.
    ///
    /// Providers without native streaming yield their whole answer as one chunk.
    ///
    /// # Errors
    ///
    /// Fails before the first chunk for the same reasons as
    /// [`RagGenerator::answer`]; later failures arrive as `Generation` items.
    pub async fn stream(&self, question: &str) -> Result<StreamingAnswer, AssistantError> {
        let question = sanitize_question(question)?;
        let (prompt, sources) = self.prepare(&question).await?;

        let chunks: AnswerStream = if self.provider.supports_streaming() {
            let inner = self.provider.stream(&prompt).await?;
            Box::pin(inner.map(|item| item.map_err(AssistantError::from)))
        } else {
            tracing::debug!(
                "{} does not stream, answering in one chunk",
                self.provider.name()
            );
            let answer = self.provider.complete(&prompt).await?;
            Box::pin(futures::stream::once(async move { Ok(answer) }))
        };

        Ok(StreamingAnswer {
            question,
            sources,
            chunks,
        })
    }

    /// Answer every question; failures become error items keyed by the question.
    pub async fn answer_batch(&self, questions: &[String]) -> Vec<BatchItem<RetrievalResult>> {
        let mut items = Vec::with_capacity(questions.len());
        for question in questions {
            let result = self.answer(question).await;
            if let Err(e) = &result {
                tracing::warn!("failed to answer '{question}': {e}");
            }
            items.push(BatchItem::from_result(question.clone(), result));
        }
        tracing::info!(
            "answered {}/{} questions",
            papyrus_papers::batch::succeeded(&items),
            questions.len()
        );
        items
    }

    async fn prepare(&self, question: &str) -> Result<(String, Vec<Source>), AssistantError> {
        let hits = self.store.search(question, self.top_k).await?;
        let context = format_context(&hits, self.context_chars);
        let prompt = self
            .prompts
            .render(QA_PROMPT, &[("context", context.as_str()), ("question", question)])?;
        let sources = hits.iter().map(Source::from_chunk).collect();
        Ok((prompt, sources))
    }
}

/// Labeled `[Document i]` blocks in rank order, separated by blank lines.
#[must_use]
pub fn format_context(hits: &[ScoredChunk], max_chars: usize) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            let source = Source::from_chunk(hit);
            let text = &hit.chunk.text;
            let content = truncate_chars(text, max_chars);
            let ellipsis = if content.len() < text.len() { "..." } else { "" };
            format!(
                "[Document {}]\nTitle: {}\nAuthors: {}\nSource: {}\nContent: {content}{ellipsis}",
                i + 1,
                source.title,
                source.authors,
                source.source,
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use papyrus_llm::mock::MockProvider;

    use super::*;
    use crate::testing::{hashed_store, paper, ranked_store};

    fn generator(mock: &MockProvider, store: Arc<DocumentStore>) -> RagGenerator<MockProvider> {
        RagGenerator::new(mock.clone(), store, Arc::new(PromptManager::default()))
    }

    #[tokio::test]
    async fn sources_follow_relevance_order() {
        let store = ranked_store().await;
        let mock = MockProvider::with_responses(vec!["X is explained by A.".into()]);
        let rag = generator(&mock, store);

        let result = rag.answer("X").await.unwrap();
        assert_eq!(result.answer, "X is explained by A.");
        assert_eq!(result.question, "X");
        let titles: Vec<_> = result.sources.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, ["A", "B"]);
        assert_eq!(result.num_sources, 2);
        assert_eq!(result.sources[0].id, "arxiv:0001.0001");
    }

    #[tokio::test]
    async fn repeated_queries_yield_same_order() {
        let store = ranked_store().await;
        let mock = MockProvider::default();
        let rag = generator(&mock, store);
        let first = rag.answer("X").await.unwrap().sources;
        let second = rag.answer("X").await.unwrap().sources;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn prompt_contains_labeled_blocks_and_question() {
        let store = ranked_store().await;
        let mock = MockProvider::default();
        let rag = generator(&mock, store);
        rag.answer("what is X?").await.unwrap();

        let prompt = &mock.prompts()[0];
        let a = prompt.find("[Document 1]\nTitle: A").unwrap();
        let b = prompt.find("[Document 2]\nTitle: B").unwrap();
        assert!(a < b);
        assert!(prompt.contains("Authors: Ada Lovelace, Alan Turing"));
        assert!(prompt.contains("Question: what is X?"));
    }

    #[tokio::test]
    async fn provider_failure_is_generation_error() {
        let store = ranked_store().await;
        let mock = MockProvider::failing();
        let rag = generator(&mock, store);
        let err = rag.answer("X").await.unwrap_err();
        assert!(matches!(err, AssistantError::Generation(_)));
        assert_eq!(mock.chat_calls(), 1);
    }

    #[tokio::test]
    async fn blank_completion_is_generation_error() {
        let store = ranked_store().await;
        let mock = MockProvider::with_responses(vec!["  \n".into()]);
        let rag = generator(&mock, store);
        assert!(matches!(
            rag.answer("X").await,
            Err(AssistantError::Generation(_))
        ));
    }

    #[tokio::test]
    async fn blank_question_is_rejected_before_retrieval() {
        let (store, embedder) = hashed_store(&[]).await;
        let mock = MockProvider::default();
        let rag = generator(&mock, store);
        assert!(matches!(
            rag.answer(" \0 ").await,
            Err(AssistantError::InvalidInput(_))
        ));
        assert_eq!(embedder.embed_calls(), 0);
        assert_eq!(mock.chat_calls(), 0);
    }

    #[tokio::test]
    async fn empty_index_still_answers() {
        let (store, _) = hashed_store(&[]).await;
        let mock = MockProvider::with_responses(vec!["I could not find that.".into()]);
        let rag = generator(&mock, store);
        let result = rag.answer("anything about graphs").await.unwrap();
        assert!(result.sources.is_empty());
        assert_eq!(result.num_sources, 0);
    }

    #[tokio::test]
    async fn top_k_limits_sources() {
        let papers = [
            paper("arxiv:1111.1111", "Graph networks", "graph neural networks"),
            paper("arxiv:2222.2222", "Graph kernels", "graph kernels survey"),
            paper("arxiv:3333.3333", "Graph drawing", "graph drawing layouts"),
        ];
        let (store, _) = hashed_store(&papers).await;
        let mock = MockProvider::default();
        let rag = generator(&mock, store).with_top_k(2);
        assert_eq!(rag.answer("graph").await.unwrap().num_sources, 2);
    }

    #[tokio::test]
    async fn stream_yields_chunks_in_order() {
        let store = ranked_store().await;
        let mock = MockProvider::with_responses(vec!["attention is all".into()]).with_streaming();
        let rag = generator(&mock, store);

        let answer = rag.stream("X").await.unwrap();
        assert_eq!(answer.sources.len(), 2);
        let chunks: Vec<String> = answer.chunks.map(Result::unwrap).collect().await;
        assert_eq!(chunks, ["attention ", "is ", "all"]);
    }

    #[tokio::test]
    async fn stream_can_stop_early() {
        let store = ranked_store().await;
        let mock = MockProvider::with_responses(vec!["one two three four".into()]).with_streaming();
        let rag = generator(&mock, store);

        let mut answer = rag.stream("X").await.unwrap();
        let first = answer.chunks.next().await.unwrap().unwrap();
        assert_eq!(first, "one ");
        drop(answer);
    }

    #[tokio::test]
    async fn non_streaming_provider_yields_single_chunk() {
        let store = ranked_store().await;
        let mock = MockProvider::with_responses(vec!["whole answer".into()]);
        let rag = generator(&mock, store);
        let chunks: Vec<String> = rag
            .stream("X")
            .await
            .unwrap()
            .chunks
            .map(Result::unwrap)
            .collect()
            .await;
        assert_eq!(chunks, ["whole answer"]);
    }

    #[tokio::test]
    async fn batch_records_per_question_failures() {
        let store = ranked_store().await;
        let mock = MockProvider::with_responses(vec!["first".into()]);
        let rag = generator(&mock, store);

        let items = rag
            .answer_batch(&["X".to_owned(), "   ".to_owned()])
            .await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].value().unwrap().answer, "first");
        assert!(items[1].error_message().unwrap().contains("invalid input"));
    }

    #[test]
    fn context_blocks_cap_content() {
        let hits = vec![ScoredChunk {
            chunk: papyrus_memory::IndexedChunk {
                id: "c".into(),
                paper_id: "arxiv:1".into(),
                text: "é".repeat(600),
                metadata: std::collections::BTreeMap::new(),
            },
            score: 0.5,
        }];
        let ctx = format_context(&hits, 500);
        assert!(ctx.starts_with("[Document 1]\nTitle: Unknown Title\nAuthors: Unknown Authors\nSource: unknown\n"));
        let content = ctx.split("Content: ").nth(1).unwrap();
        assert_eq!(content.chars().count(), 503);
        assert!(content.ends_with("..."));
    }
}
