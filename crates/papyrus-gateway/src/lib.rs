//! HTTP API over the research assistant: chat, streaming chat, search,
//! summaries, citations, indexing and free-text routing.

mod error;
mod handlers;
mod router;
mod server;
#[cfg(test)]
mod testing;

pub use error::GatewayError;
pub use server::GatewayServer;
