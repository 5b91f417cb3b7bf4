use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use guidepost_gateway::handshake::HandshakeError;
use guidepost_types::api::ErrorBody;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Failures surfaced to callers of the conversation and account operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Bad input. Nothing was mutated.
    #[error("{0}")]
    Validation(String),

    /// A referenced student or counselor does not exist. Nothing was stored.
    #[error("{0}")]
    NotFound(String),

    /// The store could not be read or the write could not be committed.
    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<HandshakeError> for ServiceError {
    fn from(e: HandshakeError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Storage(e) => {
                error!("Storage error: {:#}", e);
                "internal storage error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
