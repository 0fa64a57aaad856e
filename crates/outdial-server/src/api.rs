//! API error type shared by all handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use outdial_db::StoreError;
use outdial_dialer::DialerError;
use outdial_providers::ProviderError;
use thiserror::Error;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(entity, id) => ApiError::NotFound(format!("{entity} {id}")),
            other => ApiError::InternalServerError(other.to_string()),
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(e: ProviderError) -> Self {
        match e {
            // A credential gap becomes visible when an agent selects the
            // unconfigured provider; that is a client-fixable config problem.
            missing @ ProviderError::MissingCredential(..) => {
                ApiError::BadRequest(missing.to_string())
            }
            other => ApiError::InternalServerError(other.to_string()),
        }
    }
}

impl From<DialerError> for ApiError {
    fn from(e: DialerError) -> Self {
        match e {
            DialerError::AlreadyActive(_) => ApiError::Conflict(e.to_string()),
            DialerError::QueueFull(_) => ApiError::Conflict(e.to_string()),
            DialerError::Store(store) => store.into(),
            DialerError::TaskJoin(join) => {
                ApiError::InternalServerError(format!("task join error: {join}"))
            }
        }
    }
}

/// Runs blocking database work off the async runtime, folding join errors
/// into [`ApiError`].
pub(crate) async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::InternalServerError(format!("task join error: {e}")))?
}
