//! Request-level errors and their HTTP rendering.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;
use crate::validation::ValidationError;

// ---

#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or out-of-range request. Detected before any store access.
    #[error(transparent)]
    InvalidInput(#[from] ValidationError),

    /// The store was unreachable or refused the operation.
    #[error("{context}: {source}")]
    Storage {
        context: &'static str,
        #[source]
        source: StoreError,
    },
}

impl AppError {
    pub fn storage(context: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Storage { context, source }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidInput(ValidationError::new("body", rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidInput(ValidationError::new("query", rejection.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // ---
        match self {
            AppError::InvalidInput(err) => {
                tracing::warn!(field = err.field, reason = %err.reason, "Rejected request");
                let body = Json(json!({
                    "error": "invalid_input",
                    "field": err.field,
                    "reason": err.reason,
                }));
                (StatusCode::UNPROCESSABLE_ENTITY, body).into_response()
            }
            AppError::Storage { context, source } => {
                tracing::error!("{}: {}", context, source);
                let body = Json(json!({
                    "error": "storage_error",
                    "reason": context,
                }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}
