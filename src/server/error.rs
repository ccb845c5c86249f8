//! HTTP error responses.
//!
//! Handlers return `Result<T, ServerError>`. Client errors carry their message;
//! server-side failures are logged in full and answered with a short message so
//! provider responses, SQL or paths never reach the caller.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::AgentError;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct ServerError(#[from] AgentError);

impl ServerError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(AgentError::Validation(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            AgentError::Validation(_) => StatusCode::BAD_REQUEST,
            AgentError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(e: anyhow::Error) -> Self {
        Self(AgentError::from(e))
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ServerError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            AgentError::Validation(m) | AgentError::NotFound(m) => m.clone(),
            AgentError::Generation { stage, .. } => {
                error!(error = %self.0, "summarization failed");
                format!("model call failed at {} stage", stage)
            }
            AgentError::Stream(_) => {
                error!(error = %self.0, "chat stream failed");
                "model stream failed".to_owned()
            }
            AgentError::Template(_) => {
                error!(error = %self.0, "prompt rendering failed");
                "prompt rendering failed".to_owned()
            }
            other => {
                error!(error = %other, "internal server error");
                "internal server error".to_owned()
            }
        };

        let body = json!({ "error": { "code": self.0.code(), "message": message } });
        (status, Json(body)).into_response()
    }
}
