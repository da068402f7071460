//! Entity query SDK: derives a read-only query surface (lists, grouped queries, aggregates,
//! statistics) from a registry of entity definitions and serves it over PostgreSQL.

pub mod config;
pub mod error;
pub mod handlers;
pub mod migration;
pub mod response;
pub mod routes;
pub mod schema;
pub mod service;
pub mod session;
pub mod sql;
pub mod state;

#[cfg(test)]
mod test_support;

pub use config::{load_from_path, parse, resolve, EntityDef, EntityRegistry, RegistryConfig, Settings};
pub use error::{AppError, ConfigError, QueryError};
pub use migration::{apply_migrations, ensure_database_exists};
pub use response::{success_many, success_one_ok};
pub use routes::{common_routes, common_routes_with_ready, query_routes};
pub use schema::Schema;
pub use service::{Executor, FieldRequest};
pub use session::{DataSession, PgSession};
pub use state::AppState;
