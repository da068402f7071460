//! Query surface routes: POST per field, GET for the assembled schema.

use crate::handlers::query::{execute, fields, schema};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;

/// Request bodies are small JSON argument objects.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

pub fn query_routes(state: AppState) -> Router {
    Router::new()
        .route("/query/:field", post(execute))
        .route("/schema", get(schema))
        .route("/schema/fields", get(fields))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}
