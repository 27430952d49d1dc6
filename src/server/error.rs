//! Server error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::api::ErrorResponse;
use crate::execution::ServiceError;
use crate::logs::LogError;
use crate::resource::ResourceError;
use crate::watcher::WatchError;

/// Errors that stop the server itself.
#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("Failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The server loop failed.
    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// A failed request, rendered as a JSON error body.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Execution(#[from] ServiceError),

    #[error(transparent)]
    Log(#[from] LogError),
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Execution(e) => match e {
                ServiceError::UnknownCommand(_) | ServiceError::NotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                ServiceError::Execution(_) => StatusCode::CONFLICT,
                ServiceError::Spawn(_) | ServiceError::Collection(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Log(e) => match e {
                LogError::NotAllowed(_) => StatusCode::FORBIDDEN,
                LogError::Watch(WatchError::AlreadyWatching(_) | WatchError::NotWatching(_)) => {
                    StatusCode::CONFLICT
                }
                LogError::Resource(ResourceError::Size { source, .. })
                    if source.kind() == std::io::ErrorKind::NotFound =>
                {
                    StatusCode::NOT_FOUND
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(status = %status, error = %self, "Request rejected");
        }
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}
