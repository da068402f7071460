//! Aggregate resolvers bound to a query wrapper.

use crate::config::EntityDef;
use crate::error::QueryError;
use crate::schema::AggregateOp;
use crate::session::DataSession;
use crate::sql::{AggregateFn, ColumnRef, SelectQuery, ROOT_ALIAS};
use serde_json::Value;
use std::sync::Arc;

/// Deferred query plus the entity it selects rows from. Immutable once created and owned by
/// the request that built it.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryWrapper {
    query: SelectQuery,
}

impl QueryWrapper {
    pub fn new(query: SelectQuery) -> Self {
        QueryWrapper { query }
    }

    pub fn query(&self) -> &SelectQuery {
        &self.query
    }

    pub fn entity(&self) -> &Arc<EntityDef> {
        self.query.entity()
    }

    /// Hydrated rows of the wrapped query.
    pub async fn nodes(&self, session: &mut dyn DataSession) -> Result<Vec<Value>, QueryError> {
        session.fetch_rows(&self.query.rows()).await
    }
}

fn scalar_f64(v: Option<Value>) -> f64 {
    v.as_ref().and_then(Value::as_f64).unwrap_or(0.0)
}

fn scalar_i64(v: Option<Value>) -> i64 {
    v.as_ref().and_then(Value::as_i64).unwrap_or(0)
}

pub struct AggregateService;

impl AggregateService {
    /// `SELECT COUNT(*) FROM (query)`; 0 when the store returns nothing.
    pub async fn count(session: &mut dyn DataSession, root: &QueryWrapper) -> Result<i64, QueryError> {
        let q = root.query.count();
        Ok(scalar_i64(session.fetch_scalar(&q).await?))
    }

    /// One aggregate over one numeric field of the wrapped entity. Empty or NULL results are 0.0.
    pub async fn compute(
        session: &mut dyn DataSession,
        root: &QueryWrapper,
        op: AggregateOp,
        field: &str,
    ) -> Result<f64, QueryError> {
        let def = root
            .entity()
            .field(field)
            .filter(|f| f.scalar.is_numeric())
            .ok_or_else(|| {
                QueryError::InvalidArgument(format!(
                    "{} has no numeric field '{}'",
                    root.entity().name,
                    field
                ))
            })?;
        let column = ColumnRef {
            alias: ROOT_ALIAS.to_string(),
            column: def.name.clone(),
            scalar: def.scalar,
        };
        let func = match op {
            AggregateOp::Sum => AggregateFn::Sum,
            AggregateOp::Min => AggregateFn::Min,
            AggregateOp::Max => AggregateFn::Max,
            AggregateOp::Avg => return Self::average(session, root, &column).await,
        };
        let q = root.query.aggregate(func, &column);
        Ok(scalar_f64(session.fetch_scalar(&q).await?))
    }

    /// sum / count over the same wrapper; a zero count yields 0.0.
    async fn average(
        session: &mut dyn DataSession,
        root: &QueryWrapper,
        column: &ColumnRef,
    ) -> Result<f64, QueryError> {
        let total = scalar_f64(session.fetch_scalar(&root.query.aggregate(AggregateFn::Sum, column)).await?);
        let count = Self::count(session, root).await?;
        if count == 0 {
            return Ok(0.0);
        }
        Ok(total / count as f64)
    }

    /// SUM of an arbitrary (possibly joined) column.
    pub async fn sum_column(
        session: &mut dyn DataSession,
        query: &SelectQuery,
        column: &ColumnRef,
    ) -> Result<f64, QueryError> {
        Ok(scalar_f64(session.fetch_scalar(&query.aggregate(AggregateFn::Sum, column)).await?))
    }

    pub async fn count_column(
        session: &mut dyn DataSession,
        query: &SelectQuery,
        column: &ColumnRef,
    ) -> Result<i64, QueryError> {
        Ok(scalar_i64(session.fetch_scalar(&query.count_column(column)).await?))
    }

    pub async fn count_distinct(
        session: &mut dyn DataSession,
        query: &SelectQuery,
        column: &ColumnRef,
    ) -> Result<i64, QueryError> {
        Ok(scalar_i64(session.fetch_scalar(&query.count_distinct(column)).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample, ScriptedSession};
    use serde_json::json;

    fn items() -> QueryWrapper {
        QueryWrapper::new(SelectQuery::from_entity(sample().entity("Item").unwrap().clone()))
    }

    #[tokio::test]
    async fn empty_set_yields_zero_everywhere() {
        let root = items();
        let mut s = ScriptedSession::new(vec![]);
        assert_eq!(AggregateService::count(&mut s, &root).await.unwrap(), 0);
        for op in AggregateOp::ALL {
            assert_eq!(AggregateService::compute(&mut s, &root, op, "price").await.unwrap(), 0.0);
        }
    }

    #[tokio::test]
    async fn null_aggregate_yields_zero() {
        let root = items();
        let mut s = ScriptedSession::new(vec![json!(null), json!(0)]);
        assert_eq!(AggregateService::compute(&mut s, &root, AggregateOp::Sum, "price").await.unwrap(), 0.0);
        assert_eq!(AggregateService::count(&mut s, &root).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn average_is_sum_over_count() {
        let root = items();
        let mut s = ScriptedSession::new(vec![json!(30.0), json!(4)]);
        let avg = AggregateService::compute(&mut s, &root, AggregateOp::Avg, "price").await.unwrap();
        assert_eq!(avg, 7.5);
        assert!(s.executed[0].sql.starts_with("SELECT CAST(SUM(t0.\"price\")"));
        assert!(s.executed[1].sql.starts_with("SELECT COUNT(*) FROM ("));
    }

    #[tokio::test]
    async fn max_reprojects_wrapper_query() {
        let root = items();
        let mut s = ScriptedSession::new(vec![json!(12.5)]);
        let max = AggregateService::compute(&mut s, &root, AggregateOp::Max, "price").await.unwrap();
        assert_eq!(max, 12.5);
        assert_eq!(
            s.executed[0].sql,
            r#"SELECT CAST(MAX(t0."price") AS DOUBLE PRECISION) FROM "item" t0"#
        );
    }

    #[tokio::test]
    async fn non_numeric_field_is_rejected_without_a_query() {
        let root = items();
        let mut s = ScriptedSession::new(vec![]);
        let err = AggregateService::compute(&mut s, &root, AggregateOp::Sum, "name").await.unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument(_)));
        assert!(s.executed.is_empty());
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let root = items();
        let mut s = ScriptedSession::failing();
        let err = AggregateService::count(&mut s, &root).await.unwrap_err();
        assert!(matches!(err, QueryError::Store(_)));
    }
}
