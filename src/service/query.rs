//! List and grouped queries executed through a data session.

use crate::config::{EntityDef, EntityRegistry};
use crate::error::QueryError;
use crate::schema::{GroupKey, OrderSpec};
use crate::service::QueryWrapper;
use crate::session::DataSession;
use crate::sql::{group_column_alias, resolve_paths, ColumnRef, JoinPlan, PgBindValue, Predicate, SelectQuery};
use serde_json::Value;
use std::sync::Arc;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListArgs {
    pub order_by: OrderSpec,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
    pub sum_filter: Option<SumFilter>,
}

/// Rows ranked or filtered by the SUM of a numeric path, e.g. users by `purchases.item.price`.
#[derive(Clone, Debug, PartialEq)]
pub struct SumFilter {
    pub path: String,
    /// Keep rows whose sum is strictly greater.
    pub over: Option<f64>,
    /// Largest sums first, at most k rows.
    pub top_k: Option<i64>,
}

/// One bucket of a grouped result.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupResult {
    pub keys: Vec<GroupKey>,
    pub wrapper: QueryWrapper,
}

fn non_negative(name: &str, v: Option<i64>) -> Result<Option<u64>, QueryError> {
    match v {
        Some(n) if n < 0 => Err(QueryError::InvalidArgument(format!("{} must be non-negative, got {}", name, n))),
        Some(n) => Ok(Some(n as u64)),
        None => Ok(None),
    }
}

pub struct QueryService;

impl QueryService {
    /// `SELECT * FROM entity` with ordering (unset terms skipped), then offset and limit if given.
    /// A sum filter groups by the primary key first; its top-k caps the limit.
    pub fn list_query(
        registry: &EntityRegistry,
        entity: Arc<EntityDef>,
        args: &ListArgs,
    ) -> Result<SelectQuery, QueryError> {
        let offset = non_negative("offset", args.offset)?;
        let mut limit = non_negative("limit", args.limit)?;
        let mut query = SelectQuery::from_entity(entity.clone());
        if let Some(filter) = &args.sum_filter {
            if filter.over.is_none() && filter.top_k.is_none() {
                return Err(QueryError::InvalidArgument(
                    "sum_path needs having_sum_over or top_k_by_sum".into(),
                ));
            }
            let top_k = non_negative("top_k_by_sum", filter.top_k)?;
            let mut plan = JoinPlan::new(registry, entity);
            let column = plan.add_path(&filter.path)?;
            if !column.scalar.is_numeric() {
                return Err(QueryError::InvalidArgument(format!("'{}' is not numeric", filter.path)));
            }
            query = query
                .with_joins(plan.into_joins())
                .rank_by_sum(column, filter.over, top_k.is_some());
            limit = match (limit, top_k) {
                (Some(l), Some(k)) => Some(l.min(k)),
                (l, k) => l.or(k),
            };
        }
        for (field, descending) in args.order_by.terms() {
            if query.entity().field(field).is_none() {
                return Err(QueryError::InvalidArgument(format!(
                    "{} has no field '{}'",
                    query.entity().name,
                    field
                )));
            }
            query = query.order_by(field, descending);
        }
        if let Some(n) = offset {
            query = query.offset(n);
        }
        if let Some(n) = limit {
            query = query.limit(n);
        }
        Ok(query)
    }

    pub async fn list(
        session: &mut dyn DataSession,
        registry: &EntityRegistry,
        entity: Arc<EntityDef>,
        args: &ListArgs,
    ) -> Result<Vec<Value>, QueryError> {
        let query = Self::list_query(registry, entity, args)?;
        session.fetch_rows(&query.rows()).await
    }

    /// Wrapper over the whole, unfiltered entity set.
    pub fn whole_set(entity: Arc<EntityDef>) -> QueryWrapper {
        QueryWrapper::new(SelectQuery::from_entity(entity))
    }

    /// Resolve every path and return the joined base query plus the group columns.
    /// Nothing is executed; any resolution failure aborts before a query exists.
    pub fn group_plan(
        registry: &EntityRegistry,
        entity: Arc<EntityDef>,
        group_by: &[String],
    ) -> Result<(SelectQuery, Vec<ColumnRef>), QueryError> {
        if group_by.is_empty() {
            return Err(QueryError::EmptyGroupBy);
        }
        let (joins, columns) = resolve_paths(registry, entity.clone(), group_by)?;
        Ok((SelectQuery::from_entity(entity).with_joins(joins), columns))
    }

    /// One result per distinct combination of group values, in store order. Each carries a
    /// wrapper re-selecting the base entity filtered to exactly that combination.
    pub async fn grouped(
        session: &mut dyn DataSession,
        registry: &EntityRegistry,
        entity: Arc<EntityDef>,
        group_by: &[String],
    ) -> Result<Vec<GroupResult>, QueryError> {
        let (base, columns) = Self::group_plan(registry, entity, group_by)?;
        let rows = session.fetch_rows(&base.group_by(&columns)).await?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let mut keys = Vec::with_capacity(columns.len());
            let mut query = base.clone();
            for (i, (path, column)) in group_by.iter().zip(&columns).enumerate() {
                let value = row.get(group_column_alias(i)).cloned().unwrap_or(Value::Null);
                query = match PgBindValue::from_json(&value, column.scalar)? {
                    Some(v) => query.filter(Predicate::Eq(column.clone(), v)),
                    None => query.filter(Predicate::IsNull(column.clone())),
                };
                keys.push(GroupKey::new(path, &value));
            }
            results.push(GroupResult {
                keys,
                wrapper: QueryWrapper::new(query),
            });
        }
        tracing::debug!(entity = %base.entity().name, groups = results.len(), "grouped query");
        Ok(results)
    }
}
