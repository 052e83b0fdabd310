//! In-memory paper source for tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::SourceError;
use crate::record::PaperRecord;
use crate::source::{BoxFuture, PaperSource};
use crate::validate::is_arxiv_id;

#[derive(Debug, Clone, Default)]
pub struct MockSource {
    papers: Arc<Vec<PaperRecord>>,
    search_calls: Arc<AtomicUsize>,
    fetch_calls: Arc<AtomicUsize>,
    pub fail: bool,
}

impl MockSource {
    #[must_use]
    pub fn new(papers: Vec<PaperRecord>) -> Self {
        Self {
            papers: Arc::new(papers),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    fn upstream_error() -> SourceError {
        SourceError::Status {
            provider: "mock".into(),
            status: 503,
        }
    }
}

impl PaperSource for MockSource {
    /// Case-insensitive match of any query word against title or summary.
    fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> BoxFuture<'_, Result<Vec<PaperRecord>, SourceError>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let words: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        Box::pin(async move {
            if self.fail {
                return Err(Self::upstream_error());
            }
            Ok(self
                .papers
                .iter()
                .filter(|p| {
                    let hay = format!(
                        "{} {}",
                        p.title.to_lowercase(),
                        p.summary.as_deref().unwrap_or_default().to_lowercase()
                    );
                    words.iter().any(|w| hay.contains(w.as_str()))
                })
                .take(max_results)
                .cloned()
                .collect())
        })
    }

    fn fetch(&self, id: &str) -> BoxFuture<'_, Result<Option<PaperRecord>, SourceError>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let id = id.to_string();
        Box::pin(async move {
            if self.fail {
                return Err(Self::upstream_error());
            }
            Ok(self.papers.iter().find(|p| p.bare_id() == id).cloned())
        })
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn namespace(&self) -> &str {
        "arxiv"
    }

    fn is_valid_id(&self, bare_id: &str) -> bool {
        is_arxiv_id(bare_id)
    }
}
