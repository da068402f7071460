//! Load the registry document from disk and resolve it into the runtime registry.

use crate::config::resolved::{EntityDef, EntityRegistry, FieldDef, RelationshipDef, RowStatisticDef, StatisticDef};
use crate::config::{validate, RegistryConfig, RowStatisticKind};
use crate::error::ConfigError;
use crate::sql::JoinPlan;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Build the registry from config. Every entity must yield field metadata; any failure aborts.
pub fn resolve(config: &RegistryConfig) -> Result<EntityRegistry, ConfigError> {
    validate(config)?;

    let mut entities = Vec::with_capacity(config.entities.len());
    let mut entity_by_name = HashMap::new();
    for e in &config.entities {
        let fields = e
            .fields
            .iter()
            .map(|f| FieldDef {
                name: f.name.clone(),
                scalar: f.type_,
                nullable: f.nullable,
            })
            .collect();
        let relationships = e
            .relationships
            .iter()
            .map(|r| RelationshipDef {
                name: r.name.clone(),
                target: r.target.clone(),
                cardinality: r.cardinality,
                local_key: r.local_key.clone(),
                remote_key: r.remote_key.clone(),
            })
            .collect();
        let entity = Arc::new(EntityDef {
            name: e.name.clone(),
            table_name: e.table.clone().unwrap_or_else(|| e.name.to_lowercase()),
            primary_key: e.primary_key.clone().unwrap_or_else(|| "id".into()),
            fields,
            relationships,
            statistics: e
                .statistics
                .iter()
                .map(|s| RowStatisticDef {
                    name: s.name.clone(),
                    kind: s.kind,
                    over: s.over.clone(),
                    value: s.value.clone(),
                })
                .collect(),
        });
        tracing::info!(entity = %entity.name, fields = entity.fields.len(), relationships = entity.relationships.len(), "registering entity");
        entity_by_name.insert(entity.name.clone(), entity.clone());
        entities.push(entity);
    }

    let mut registry = EntityRegistry {
        entities,
        entity_by_name,
        statistics: Vec::new(),
    };

    for entity in &registry.entities {
        for stat in &entity.statistics {
            check_row_statistic(&registry, entity, stat)?;
        }
    }

    let mut statistics = Vec::with_capacity(config.statistics.len());
    for s in &config.statistics {
        let root = registry
            .entity(&s.entity)
            .cloned()
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "statistic entity",
                id: s.entity.clone(),
            })?;
        let column = JoinPlan::new(&registry, root)
            .add_path(&s.value)
            .map_err(|e| ConfigError::InvalidStatistic {
                name: s.name.clone(),
                reason: e.to_string(),
            })?;
        if !column.scalar.is_numeric() {
            return Err(ConfigError::InvalidStatistic {
                name: s.name.clone(),
                reason: format!("'{}' is not numeric", s.value),
            });
        }
        statistics.push(StatisticDef {
            name: s.name.clone(),
            kind: s.kind,
            entity: s.entity.clone(),
            value_path: s.value.clone(),
            per: s.per.clone(),
        });
    }
    registry.statistics = statistics;

    Ok(registry)
}

/// The `over` path must join at least one relationship; a value path must resolve to a number.
fn check_row_statistic(
    registry: &EntityRegistry,
    entity: &Arc<EntityDef>,
    stat: &RowStatisticDef,
) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidStatistic {
        name: format!("{}.{}", entity.name, stat.name),
        reason,
    };
    let mut plan = JoinPlan::new(registry, entity.clone());
    plan.add_join_path(&stat.over).map_err(|e| invalid(e.to_string()))?;
    match (&stat.value, stat.kind) {
        (None, RowStatisticKind::Count) => Ok(()),
        (None, _) => Err(invalid("'value' is required".into())),
        (Some(value), _) => {
            let column = plan.add_path(value).map_err(|e| invalid(e.to_string()))?;
            if column.scalar.is_numeric() {
                Ok(())
            } else {
                Err(invalid(format!("'{}' is not numeric", value)))
            }
        }
    }
}

/// Parse a registry document.
pub fn parse(json: &str) -> Result<RegistryConfig, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))
}

/// Read, parse and resolve the registry document at `path`.
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<EntityRegistry, ConfigError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    resolve(&parse(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve_str(json: &str) -> Result<EntityRegistry, ConfigError> {
        resolve(&parse(json)?)
    }

    #[test]
    fn resolves_sample_registry() {
        let reg = resolve_str(include_str!("../../config/entities.json")).unwrap();
        assert_eq!(reg.entities.len(), 4);
        let item = reg.entity("Item").unwrap();
        assert_eq!(item.table_name, "item");
        assert_eq!(item.primary_key, "id");
        let numeric: Vec<_> = item.numeric_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(numeric, ["id", "price", "category_id"]);
        assert_eq!(reg.statistics.len(), 2);
        let user = reg.entity("User").unwrap();
        let names: Vec<_> = user.statistics.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["total_spent", "num_purchases", "top_expensive_purchase"]);
    }

    #[test]
    fn row_statistic_over_a_field_aborts() {
        let err = resolve_str(
            r#"{"entities": [{"name": "A", "fields": [{"name": "id", "type": "int"}],
                "statistics": [{"name": "n", "kind": "count", "over": "id"}]}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidStatistic { ref name, .. } if name == "A.n"));
    }

    #[test]
    fn row_sum_without_value_aborts() {
        let mut config = parse(include_str!("../../config/entities.json")).unwrap();
        let item = config.entities.iter_mut().find(|e| e.name == "Item").unwrap();
        item.statistics[0].value = None;
        let err = resolve(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidStatistic { ref reason, .. } if reason.contains("required")));
    }

    #[test]
    fn entity_without_fields_aborts() {
        let err = resolve_str(r#"{"entities": [{"name": "Ghost"}]}"#).unwrap_err();
        assert!(matches!(err, ConfigError::NoFields(ref n) if n == "Ghost"));
    }

    #[test]
    fn unknown_relationship_target_aborts() {
        let err = resolve_str(
            r#"{"entities": [{"name": "A", "fields": [{"name": "id", "type": "int"}],
                "relationships": [{"name": "b", "target": "B", "cardinality": "to_one", "local_key": "id", "remote_key": "id"}]}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingReference { kind: "relationship target", .. }));
    }

    #[test]
    fn missing_join_key_aborts() {
        let err = resolve_str(
            r#"{"entities": [
                {"name": "A", "fields": [{"name": "id", "type": "int"}],
                 "relationships": [{"name": "b", "target": "B", "cardinality": "to_one", "local_key": "b_id", "remote_key": "id"}]},
                {"name": "B", "fields": [{"name": "id", "type": "int"}]}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingReference { kind: "join key", .. }));
    }

    #[test]
    fn duplicate_entity_aborts() {
        let err = resolve_str(
            r#"{"entities": [
                {"name": "A", "fields": [{"name": "id", "type": "int"}]},
                {"name": "A", "fields": [{"name": "id", "type": "int"}]}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Duplicate { kind: "entity", .. }));
    }

    #[test]
    fn non_numeric_statistic_aborts() {
        let err = resolve_str(
            r#"{"entities": [{"name": "A", "fields": [{"name": "id", "type": "int"}, {"name": "label", "type": "string"}]}],
                "statistics": [{"name": "s", "kind": "total", "entity": "A", "value": "label"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidStatistic { .. }));
    }

    #[test]
    fn unknown_scalar_type_is_a_load_error() {
        let err = parse(r#"{"entities": [{"name": "A", "fields": [{"name": "id", "type": "uuid"}]}]}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }
}
