//! Paper repository adapter: record model, provider trait, arXiv client and loader.

pub mod arxiv;
pub mod batch;
pub mod error;
pub mod loader;
pub mod pdf;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod record;
pub mod source;
pub mod validate;

pub use batch::{BatchItem, ItemOutcome};
pub use error::SourceError;
pub use loader::PaperLoader;
pub use record::PaperRecord;
pub use source::PaperSource;
