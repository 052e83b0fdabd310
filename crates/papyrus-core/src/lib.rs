//! Configuration, prompts, retrieval-augmented answers, summaries, citations and routing.

pub mod assistant;
pub mod citation;
pub mod config;
pub mod error;
pub mod prompts;
pub mod rag;
pub mod router;
pub mod summarizer;
pub mod text;

#[cfg(test)]
mod testing;

pub use assistant::{Assistant, IndexReport, RouteDecision, RoutePayload, SearchResults};
pub use citation::{CitationFields, CitationFormatter, CitationStyle};
pub use config::Config;
pub use error::AssistantError;
pub use prompts::PromptManager;
pub use rag::{RagGenerator, RetrievalResult};
pub use router::{Intent, classify};
pub use summarizer::{SummaryFormat, SummaryOptions, Summarizer};
