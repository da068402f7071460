//! HTTP handlers for the query surface.

pub mod query;
pub use query::*;
