use axum::Json;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::store::StoreError;

// Everything a handler or the admission gate can surface to a client
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Too many requests, please try again later")]
    RateLimitExceeded { retry_after_secs: u64 },
    #[error("rate limiter storage unavailable")]
    StorageUnavailable(#[from] StoreError),
    #[error("identity key must not be empty")]
    InvalidIdentityKey,
    #[error("Note not found")]
    NoteNotFound,
    #[error("Title and content are required")]
    MissingFields,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InvalidIdentityKey => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NoteNotFound => StatusCode::NOT_FOUND,
            ApiError::MissingFields => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({ "message": self.to_string() }));

        match self {
            ApiError::RateLimitExceeded { retry_after_secs } => (
                status,
                [(header::RETRY_AFTER, retry_after_secs.to_string())],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}
