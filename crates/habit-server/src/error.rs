use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use habit_engine::EngineError;
use thiserror::Error;

/// Errors that can occur when running the server or handling a request.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error (e.g. binding the listener).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An error surfaced from the reminder engine.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// The caller's identity could not be established.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            Self::Io(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            Self::Engine(EngineError::Validation(msg)) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Engine(EngineError::InvalidTransition(msg)) => {
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            Self::Engine(EngineError::NotFound(msg)) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Engine(e @ EngineError::SchedulingFailed(_))
            | Self::Engine(e @ EngineError::TransientIo(_))
            | Self::Engine(e @ EngineError::PermanentIo(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}
