use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::batch::BatchItem;
use crate::error::SourceError;
use crate::record::PaperRecord;
use crate::source::PaperSource;
use crate::validate::{validate_max_results, validate_query};

/// Validating front for a [`PaperSource`] with an optional lookup cache.
#[derive(Clone)]
pub struct PaperLoader {
    source: Arc<dyn PaperSource>,
    default_max_results: usize,
    cache_ttl: Duration,
    cache: Arc<Mutex<HashMap<String, (Instant, PaperRecord)>>>,
}

impl std::fmt::Debug for PaperLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaperLoader")
            .field("source", &self.source.name())
            .field("default_max_results", &self.default_max_results)
            .field("cache_ttl", &self.cache_ttl)
            .finish_non_exhaustive()
    }
}

impl PaperLoader {
    #[must_use]
    pub fn new(source: Arc<dyn PaperSource>) -> Self {
        Self {
            source,
            default_max_results: 10,
            cache_ttl: Duration::ZERO,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    #[must_use]
    pub fn with_default_max_results(mut self, n: usize) -> Self {
        self.default_max_results = n;
        self
    }

    /// Cache successful `load_by_id` lookups for `ttl`. Zero disables caching.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    #[must_use]
    pub fn default_max_results(&self) -> usize {
        self.default_max_results
    }

    #[must_use]
    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Search the repository.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidQuery`] without contacting the repository
    /// when validation fails, or an upstream error from the source.
    pub async fn search(
        &self,
        query: &str,
        max_results: Option<usize>,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        validate_query(query)?;
        let max_results = max_results.unwrap_or(self.default_max_results);
        validate_max_results(max_results)?;

        let query = query.trim();
        tracing::info!("searching {}: '{query}'", self.source.name());
        let papers = self.source.search(query, max_results).await?;
        tracing::info!("found {} papers for '{query}'", papers.len());
        Ok(papers)
    }

    /// Load one paper by id, with or without its namespace prefix.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidId`] for empty, malformed or foreign-namespace
    /// ids, [`SourceError::NotFound`] when the repository has no such paper, or
    /// an upstream error.
    pub async fn load_by_id(&self, id: &str) -> Result<PaperRecord, SourceError> {
        let bare = self.resolve_id(id)?;

        if let Some(hit) = self.cached(bare) {
            tracing::debug!("paper cache hit: {bare}");
            return Ok(hit);
        }

        tracing::info!("loading paper {bare} from {}", self.source.name());
        let record = self
            .source
            .fetch(bare)
            .await?
            .ok_or_else(|| SourceError::NotFound(id.trim().to_string()))?;

        self.store(bare, &record);
        Ok(record)
    }

    /// Load every id; failures become error items and never abort the batch.
    pub async fn load_multiple(&self, ids: &[String]) -> Vec<BatchItem<PaperRecord>> {
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            let result = self.load_by_id(id).await;
            if let Err(e) = &result {
                tracing::warn!("skipping paper {id}: {e}");
            }
            items.push(BatchItem::from_result(id.clone(), result));
        }
        tracing::info!(
            "loaded {}/{} papers",
            crate::batch::succeeded(&items),
            ids.len()
        );
        items
    }

    fn resolve_id<'a>(&self, id: &'a str) -> Result<&'a str, SourceError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(SourceError::InvalidId("paper id is empty".into()));
        }
        let Some((namespace, bare)) = id.split_once(':') else {
            return Ok(id);
        };
        if !namespace.eq_ignore_ascii_case(self.source.namespace()) {
            return Err(SourceError::InvalidId(format!(
                "unsupported namespace '{namespace}' for {}",
                self.source.name()
            )));
        }
        if !self.source.is_valid_id(bare) {
            return Err(SourceError::InvalidId(format!(
                "invalid {} paper id format: {bare}",
                self.source.name()
            )));
        }
        Ok(bare)
    }

    fn cached(&self, key: &str) -> Option<PaperRecord> {
        if self.cache_ttl.is_zero() {
            return None;
        }
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        match cache.get(key) {
            Some((at, record)) if at.elapsed() < self.cache_ttl => Some(record.clone()),
            Some(_) => {
                cache.remove(key);
                None
            }
            None => None,
        }
    }

    fn store(&self, key: &str, record: &PaperRecord) {
        if self.cache_ttl.is_zero() {
            return;
        }
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), (Instant::now(), record.clone()));
    }
}
