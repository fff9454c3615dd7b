//! Error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::engine::artifact::ArtifactError;
use crate::engine::keypoints::ExtractError;
use crate::engine::predict::PredictError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    // Input errors
    ValidationError(String),
    MalformedInput(String),
    DegenerateInput,

    // Serving state
    ServiceUnavailable,

    // Model/artifact errors
    ArtifactLoadError(String),

    // Database errors
    DatabaseError(String),

    // Generic errors
    InternalError(String),
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "validation_error",
            AppError::MalformedInput(_) => "malformed_input",
            AppError::DegenerateInput => "degenerate_input",
            AppError::ServiceUnavailable => "service_unavailable",
            AppError::ArtifactLoadError(_) => "artifact_load_error",
            AppError::DatabaseError(_) => "registry_write_error",
            AppError::InternalError(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            AppError::MalformedInput(msg) => (StatusCode::BAD_REQUEST, msg.as_str()),
            AppError::DegenerateInput => (
                StatusCode::BAD_REQUEST,
                "keypoint coordinates are all zero; cannot normalize",
            ),
            AppError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "no classifier is active; upload a model first",
            ),
            AppError::ArtifactLoadError(msg) => {
                tracing::error!("Artifact load error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "failed to store or load model artifact")
            }
            AppError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "database error occurred")
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        };

        let body = Json(json!({
            "error": error_message,
            "kind": self.kind(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<ExtractError> for AppError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::MalformedInput(msg) => AppError::MalformedInput(msg),
            ExtractError::DegenerateInput => AppError::DegenerateInput,
        }
    }
}

impl From<PredictError> for AppError {
    fn from(err: PredictError) -> Self {
        match err {
            PredictError::Unavailable => AppError::ServiceUnavailable,
            PredictError::Extract(e) => e.into(),
            PredictError::Inference(e) => AppError::InternalError(e.to_string()),
        }
    }
}

impl From<ArtifactError> for AppError {
    fn from(err: ArtifactError) -> Self {
        AppError::ArtifactLoadError(err.to_string())
    }
}
