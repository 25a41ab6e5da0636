use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

/// Typed error taxonomy. Each variant maps to exactly one HTTP status via
/// `ResponseError`, which is the sole boundary converter between internal
/// errors and the wire.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to fetch source {source_name}: {message}")]
    SourceFetch { source_name: String, message: String },

    #[error("failed to parse calendar feed {source_name}: {message}")]
    Parse { source_name: String, message: String },

    #[error("unknown timezone: {0}")]
    Timezone(String),

    #[error("unauthorized")]
    Authentication,

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("skip store error: {0}")]
    SkipStore(String),

    #[error("failed to render speech: {0}")]
    Render(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::Config(msg) => {
                HttpResponse::InternalServerError().json(json!({"error": "Internal server error", "message": msg}))
            }
            AppError::SourceFetch { message, .. } => HttpResponse::InternalServerError()
                .json(json!({"error": "Internal server error", "message": message})),
            AppError::Parse { message, .. } => HttpResponse::InternalServerError()
                .json(json!({"error": "Internal server error", "message": message})),
            AppError::Timezone(msg) => {
                HttpResponse::BadRequest().json(json!({"error": "Validation error", "message": msg}))
            }
            AppError::Authentication => {
                HttpResponse::Unauthorized().json(json!({"error": "Unauthorized"}))
            }
            AppError::Validation(msg) => {
                HttpResponse::BadRequest().json(json!({"error": msg}))
            }
            AppError::SkipStore(msg) => HttpResponse::InternalServerError()
                .json(json!({"error": msg})),
            AppError::Render(msg) => HttpResponse::InternalServerError()
                .json(json!({"error": "Internal server error", "message": msg})),
            AppError::Internal(err) => HttpResponse::InternalServerError()
                .json(json!({"error": "Internal server error", "message": format!("{err:#}")})),
        }
    }
}
