//! Router builders. Each takes the shared state and returns a stateless `Router`.

pub mod common;
pub mod query;

pub use common::{common_routes, common_routes_with_ready};
pub use query::query_routes;
