//! Registry-derived query surface.

pub mod aggregate;
pub mod assembler;
pub mod synth;

pub use aggregate::{AggregateOp, AggregateOpGroup, AggregateType};
pub use assembler::{field_prefix, EntitySchema, GENERAL_STATISTICS, QueryField, QueryFieldKind, Schema, StatisticField};
pub use synth::{describe, EntityType, FieldDescriptor, GroupKey, OrderByType, OrderSpec, SortDirection};
