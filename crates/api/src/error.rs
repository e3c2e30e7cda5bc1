use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use storyreel_core::error::CoreError;
use storyreel_db::store::StoreError;
use storyreel_pipeline::GenerationError;

/// Application-level error type for HTTP handlers.
///
/// Produces a `{ "error", "code" }` JSON body. Internal failures are logged
/// and replaced with a generic message.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Generation(GenerationError::Persistence(err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Core(CoreError::Validation(errors.to_string()))
    }
}

fn internal(error: &dyn std::fmt::Display) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %error, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

fn classify_core(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Configuration(msg) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "CONFIGURATION_ERROR",
            msg.clone(),
        ),
        CoreError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
        CoreError::Internal(msg) => internal(msg),
    }
}

fn classify_generation(err: &GenerationError) -> (StatusCode, &'static str, String) {
    match err {
        GenerationError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
        GenerationError::Validation(msg) => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
        }
        GenerationError::Configuration(msg) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "CONFIGURATION_ERROR",
            msg.clone(),
        ),
        GenerationError::ReferenceMissing { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "REFERENCE_MISSING",
            err.to_string(),
        ),
        GenerationError::Provider(_) => (StatusCode::BAD_GATEWAY, "PROVIDER_ERROR", err.to_string()),
        GenerationError::Storage(_) => (StatusCode::BAD_GATEWAY, "STORAGE_ERROR", err.to_string()),
        GenerationError::TransientNetwork(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "UPSTREAM_UNAVAILABLE",
            err.to_string(),
        ),
        GenerationError::Timeout(_) => {
            (StatusCode::GATEWAY_TIMEOUT, "UPSTREAM_TIMEOUT", err.to_string())
        }
        GenerationError::Persistence(store) => internal(store),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core(core),
            AppError::Generation(generation) => classify_generation(generation),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => internal(msg),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
