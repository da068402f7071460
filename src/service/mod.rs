pub mod aggregate;
pub mod executor;
pub mod query;
pub mod statistics;

pub use aggregate::{AggregateService, QueryWrapper};
pub use executor::{AggregateSelection, Executor, FieldRequest, Selection};
pub use query::{GroupResult, ListArgs, QueryService, SumFilter};
pub use statistics::StatisticsService;
