//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Registration failures: fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("entity {0} has no fields")]
    NoFields(String),
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("duplicate {kind}: {name}")]
    Duplicate { kind: &'static str, name: String },
    #[error("invalid {kind} identifier: '{name}'")]
    InvalidIdentifier { kind: &'static str, name: String },
    #[error("invalid statistic {name}: {reason}")]
    InvalidStatistic { name: String, reason: String },
    #[error("config load: {0}")]
    Load(String),
    #[error("settings: {0}")]
    Settings(String),
}

/// Request-scoped failures. None of these affect the schema or other requests.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("path resolution: {0}")]
    PathResolution(String),
    #[error("field resolution: field '{field}' not found on {entity}")]
    FieldResolution { entity: String, field: String },
    #[error("provide at least one field to group by")]
    EmptyGroupBy,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unknown query field: {0}")]
    UnknownField(String),
    #[error("store execution: {0}")]
    Store(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::Query(q) => match q {
                QueryError::PathResolution(_) => (StatusCode::BAD_REQUEST, "path_resolution_error"),
                QueryError::FieldResolution { .. } => (StatusCode::BAD_REQUEST, "field_resolution_error"),
                QueryError::EmptyGroupBy => (StatusCode::BAD_REQUEST, "empty_group_by"),
                QueryError::InvalidArgument(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_argument"),
                QueryError::UnknownField(_) => (StatusCode::NOT_FOUND, "not_found"),
                QueryError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_execution_error"),
            },
            AppError::Db(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
