use std::future::Future;
use std::time::Duration;

use ollama_rs::Ollama;

use crate::error::LlmError;
use crate::http::DEFAULT_REQUEST_TIMEOUT;
use ollama_rs::generation::chat::ChatMessage;
use ollama_rs::generation::chat::request::ChatMessageRequest;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use tokio_stream::StreamExt;

use crate::provider::{ChatStream, LlmProvider, Message, Role};

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    client: Ollama,
    model: String,
    embedding_model: String,
    timeout: Duration,
}

impl OllamaProvider {
    #[must_use]
    pub fn new(base_url: &str, model: String, embedding_model: String) -> Self {
        let (host, port) = parse_host_port(base_url);
        Self {
            client: Ollama::new(host, port),
            model,
            embedding_model,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Upper bound for one request, and for the gap between two stream chunks.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T, E>(
        &self,
        what: &str,
        fut: impl Future<Output = Result<T, E>>,
    ) -> Result<T, LlmError>
    where
        E: std::fmt::Display,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(|e| LlmError::Other(format!("Ollama {what} failed: {e}"))),
            Err(_) => {
                tracing::warn!("Ollama {what} timed out after {:?}", self.timeout);
                Err(LlmError::Timeout {
                    provider: "ollama".into(),
                    timeout: self.timeout,
                })
            }
        }
    }

    /// Check if Ollama is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection to Ollama fails.
    pub async fn health_check(&self) -> Result<(), LlmError> {
        match tokio::time::timeout(self.timeout, self.client.list_local_models()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(LlmError::Other(format!(
                "failed to connect to Ollama, is it running? {e}"
            ))),
            Err(_) => Err(LlmError::Timeout {
                provider: "ollama".into(),
                timeout: self.timeout,
            }),
        }
    }
}

impl LlmProvider for OllamaProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        let ollama_messages: Vec<ChatMessage> = messages.iter().map(convert_message).collect();
        let request = ChatMessageRequest::new(self.model.clone(), ollama_messages);

        let response = self
            .bounded("chat request", self.client.send_chat_messages(request))
            .await?;

        Ok(response.message.content)
    }

    async fn chat_stream(&self, messages: &[Message]) -> Result<ChatStream, LlmError> {
        let ollama_messages: Vec<ChatMessage> = messages.iter().map(convert_message).collect();
        let request = ChatMessageRequest::new(self.model.clone(), ollama_messages);

        let stream = self
            .bounded(
                "streaming request",
                self.client.send_chat_messages_stream(request),
            )
            .await?;

        let timeout = self.timeout;
        let mapped = stream.timeout(timeout).map(move |item| match item {
            Ok(Ok(response)) => Ok(response.message.content),
            Ok(Err(())) => Err(LlmError::Other("Ollama stream chunk failed".into())),
            Err(_) => Err(LlmError::Timeout {
                provider: "ollama".into(),
                timeout,
            }),
        });

        Ok(Box::pin(mapped))
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let request = GenerateEmbeddingsRequest::new(
            self.embedding_model.clone(),
            EmbeddingsInput::from(text),
        );

        let response = self
            .bounded("embedding request", self.client.generate_embeddings(request))
            .await?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyResponse {
                provider: "ollama".into(),
            })
    }

    fn supports_embeddings(&self) -> bool {
        true
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "ollama"
    }
}

fn convert_message(msg: &Message) -> ChatMessage {
    let text = msg.content.clone();
    match msg.role {
        Role::System => ChatMessage::system(text),
        Role::Assistant => ChatMessage::assistant(text),
        Role::User => ChatMessage::user(text),
    }
}

fn parse_host_port(url: &str) -> (String, u16) {
    let url = url.trim_end_matches('/');
    if let Some(colon_pos) = url.rfind(':') {
        let port_str = &url[colon_pos + 1..];
        if let Ok(port) = port_str.parse::<u16>() {
            let host = url[..colon_pos].to_string();
            return (host, port);
        }
    }
    (url.to_string(), 11434)
}
