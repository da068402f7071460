//! Shared application state for all routes. The schema is built once and never mutated.

use crate::schema::Schema;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub schema: Arc<Schema>,
    /// Applied to each request's session.
    pub statement_timeout: Option<Duration>,
}
