//! Safe SQL builder: identifiers from the registry only, values as parameters.

mod builder;
pub mod params;
pub mod path;
pub use builder::*;
pub use params::*;
pub use path::{resolve_paths, ColumnRef, JoinPlan, JoinStep, ROOT_ALIAS};
