use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use papyrus_core::AssistantError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to bind {0}: {1}")]
    Bind(String, std::io::Error),
    #[error("server error: {0}")]
    Server(String),
}

/// Handler failure rendered as `{error, code}`.
#[derive(Debug)]
pub(crate) enum ApiError {
    Assistant(AssistantError),
    /// Request that never reached a handler body: bad JSON, bad query string, oversized body.
    Rejected { status: StatusCode, message: String },
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    code: &'a str,
}

impl ApiError {
    pub(crate) fn status(&self) -> StatusCode {
        match self {
            Self::Assistant(AssistantError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            Self::Assistant(AssistantError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Assistant(AssistantError::Upstream(_)) => StatusCode::BAD_GATEWAY,
            Self::Assistant(AssistantError::Generation(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Rejected { status, .. } => *status,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Assistant(e) => e.code(),
            Self::Rejected { status, .. } if *status == StatusCode::PAYLOAD_TOO_LARGE => {
                "payload_too_large"
            }
            Self::Rejected { .. } => "invalid_input",
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Assistant(e) => e.to_string(),
            Self::Rejected { message, .. } => message.clone(),
        }
    }
}

impl From<AssistantError> for ApiError {
    fn from(e: AssistantError) -> Self {
        Self::Assistant(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        // Keep 413 from the body limit; everything else is the caller's fault.
        let status = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        Self::Rejected {
            status,
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Rejected {
            status: StatusCode::BAD_REQUEST,
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();
        if status.is_server_error() {
            tracing::error!("request failed ({}): {message}", self.code());
        } else {
            tracing::debug!("request rejected ({}): {message}", self.code());
        }
        let body = ErrorBody {
            error: message,
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}
