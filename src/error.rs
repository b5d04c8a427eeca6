use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

/// Failures of the assistant's external collaborators. None of these are
/// shown to the user raw — the orchestrator converts them into a generic
/// notice at the request boundary.
#[derive(thiserror::Error, Debug)]
pub enum AssistantError {
    #[error("language model call failed: {0}")]
    Provider(String),

    #[error("external dependency failed: {0}")]
    Dependency(String),

    #[error("{0} call timed out after {1}s")]
    Timeout(&'static str, u64),
}

/// HTTP-surface errors. Maps domain failures onto status codes with a
/// JSON error body so callers never see a raw internal fault.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("missing or invalid bearer token")]
    Unauthorized,
}

impl From<crate::catalog::CatalogError> for ApiError {
    fn from(e: crate::catalog::CatalogError) -> Self {
        use crate::catalog::CatalogError::*;
        match e {
            BookNotFound => ApiError::NotFound("book"),
            AuthorNotFound => ApiError::NotFound("author"),
            DuplicateAuthor => ApiError::Conflict("author already exists".into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
        };

        let body = json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}
