//! Named statistics over (possibly joined) numeric value paths: whole-set values and
//! per-row values keyed on one row's primary key.

use crate::config::{EntityDef, EntityRegistry, RowStatisticDef, RowStatisticKind, ScalarType, StatisticDef, StatisticKind};
use crate::error::QueryError;
use crate::service::AggregateService;
use crate::session::DataSession;
use crate::sql::{ColumnRef, JoinPlan, PgBindValue, Predicate, SelectQuery, ROOT_ALIAS};
use serde_json::{json, Value};
use std::sync::Arc;

pub struct StatisticsService;

impl StatisticsService {
    pub async fn evaluate(
        session: &mut dyn DataSession,
        registry: &EntityRegistry,
        stat: &StatisticDef,
    ) -> Result<f64, QueryError> {
        let entity = registry
            .entity(&stat.entity)
            .cloned()
            .ok_or_else(|| QueryError::UnknownField(stat.entity.clone()))?;
        let mut plan = JoinPlan::new(registry, entity.clone());
        let value = plan.add_path(&stat.value_path)?;
        let per = stat.per.as_deref().map(|p| plan.add_path(p)).transpose()?;
        let query = SelectQuery::from_entity(entity).with_joins(plan.into_joins());

        let total = AggregateService::sum_column(session, &query, &value).await?;
        match (stat.kind, per) {
            (StatisticKind::Total, _) => Ok(total),
            (StatisticKind::AvgPerDistinct, Some(per)) => {
                let distinct = AggregateService::count_distinct(session, &query, &per).await?;
                if distinct == 0 {
                    return Ok(0.0);
                }
                Ok(total / distinct as f64)
            }
            (StatisticKind::AvgPerDistinct, None) => Err(QueryError::InvalidArgument(format!(
                "statistic {} has no distinct field",
                stat.name
            ))),
        }
    }

    /// One row statistic for the row of `entity` whose primary key is `key`.
    /// Sums are 0.0 and counts 0 when no related row exists; a max row is then null.
    pub async fn evaluate_row(
        session: &mut dyn DataSession,
        registry: &EntityRegistry,
        entity: &Arc<EntityDef>,
        stat: &RowStatisticDef,
        key: &Value,
    ) -> Result<Value, QueryError> {
        let mut plan = JoinPlan::new(registry, entity.clone());
        let (over_alias, over) = plan.add_join_path(&stat.over)?;
        let value = stat.value.as_deref().map(|v| plan.add_path(v)).transpose()?;
        let pk = ColumnRef {
            alias: ROOT_ALIAS.to_string(),
            column: entity.primary_key.clone(),
            scalar: entity
                .field(&entity.primary_key)
                .map(|f| f.scalar)
                .ok_or_else(|| QueryError::FieldResolution {
                    entity: entity.name.clone(),
                    field: entity.primary_key.clone(),
                })?,
        };
        let query = SelectQuery::from_entity(entity.clone()).with_joins(plan.into_joins());
        let query = match PgBindValue::from_json(key, pk.scalar)? {
            Some(v) => query.filter(Predicate::Eq(pk, v)),
            None => query.filter(Predicate::IsNull(pk)),
        };

        match (stat.kind, value) {
            (RowStatisticKind::Count, _) => {
                let counted = ColumnRef {
                    alias: over_alias,
                    column: over.primary_key.clone(),
                    scalar: over
                        .field(&over.primary_key)
                        .map(|f| f.scalar)
                        .unwrap_or(ScalarType::Int),
                };
                Ok(json!(AggregateService::count_column(session, &query, &counted).await?))
            }
            (RowStatisticKind::Sum, Some(value)) => {
                Ok(json!(AggregateService::sum_column(session, &query, &value).await?))
            }
            (RowStatisticKind::MaxRow, Some(value)) => {
                let rows = session.fetch_rows(&query.top_row(&over_alias, &over, &value)).await?;
                Ok(rows.into_iter().next().unwrap_or(Value::Null))
            }
            (_, None) => Err(QueryError::InvalidArgument(format!(
                "statistic {} has no value path",
                stat.name
            ))),
        }
    }
}
