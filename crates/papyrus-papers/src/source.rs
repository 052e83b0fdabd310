use std::future::Future;
use std::pin::Pin;

use crate::error::SourceError;
use crate::record::PaperRecord;

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Capability interface over an external paper repository.
pub trait PaperSource: Send + Sync {
    /// Free-text search returning at most `max_results` records.
    fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> BoxFuture<'_, Result<Vec<PaperRecord>, SourceError>>;

    /// Fetch one record by its identifier without namespace. `None` when the
    /// repository has no such paper.
    fn fetch(&self, id: &str) -> BoxFuture<'_, Result<Option<PaperRecord>, SourceError>>;

    fn name(&self) -> &str;

    /// Namespace prefix used in record ids, e.g. `arxiv`.
    fn namespace(&self) -> &str;

    /// Whether a namespaced id's local part is well formed for this repository.
    fn is_valid_id(&self, _bare_id: &str) -> bool {
        true
    }
}
