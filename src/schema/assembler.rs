//! Merges every entity's derived types and operations into one query surface.

use crate::config::{EntityDef, EntityRegistry};
use crate::schema::{describe, AggregateType, EntityType, OrderByType};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryFieldKind {
    /// `<entity>s`: filtered, ordered, paginated rows.
    List,
    /// `<entity>s_grouped`: one bucket per distinct group-by combination.
    Grouped,
    /// `<entity>s_aggregate`: aggregate object over the whole entity set.
    Aggregate,
    /// `general_statistics`: every configured whole-set statistic.
    Statistics,
}

/// Surface field holding the configured statistics.
pub const GENERAL_STATISTICS: &str = "general_statistics";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueryField {
    pub name: String,
    pub kind: QueryFieldKind,
    /// None for fields not bound to one entity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

/// Everything derived for one entity.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntitySchema {
    #[serde(skip)]
    pub def: Arc<EntityDef>,
    pub entity_type: EntityType,
    pub order_by_type: OrderByType,
    pub group_result_type: String,
    pub aggregate_type: AggregateType,
    /// Row statistics selectable on this entity's rows.
    pub row_statistics: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatisticField {
    pub name: String,
    pub entity: String,
}

/// Built once at startup and shared read-only (`Arc<Schema>`) for the process lifetime.
#[derive(Clone, Debug, Serialize)]
pub struct Schema {
    pub entities: BTreeMap<String, EntitySchema>,
    pub fields: BTreeMap<String, QueryField>,
    pub statistics: Vec<StatisticField>,
    #[serde(skip)]
    pub registry: Arc<EntityRegistry>,
}

/// Same entity names, field names and types: registry identity is not compared.
impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.entities == other.entities && self.fields == other.fields && self.statistics == other.statistics
    }
}

/// Surface field name prefix for an entity: `PurchaseItem` -> `purchase_item`.
pub fn field_prefix(entity_name: &str) -> String {
    let mut out = String::with_capacity(entity_name.len() + 4);
    for (i, c) in entity_name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

impl Schema {
    /// Pure function of the registry.
    pub fn build(registry: Arc<EntityRegistry>) -> Self {
        let mut entities = BTreeMap::new();
        let mut fields = BTreeMap::new();
        for def in &registry.entities {
            let descriptors = describe(def);
            let schema = EntitySchema {
                def: def.clone(),
                entity_type: EntityType::from_descriptors(&def.name, &descriptors),
                order_by_type: OrderByType::from_descriptors(&def.name, &descriptors),
                group_result_type: format!("{}GroupResult", def.name),
                aggregate_type: AggregateType::from_entity(def),
                row_statistics: def.statistics.iter().map(|s| s.name.clone()).collect(),
            };
            let prefix = field_prefix(&def.name);
            for (suffix, kind) in [
                ("s", QueryFieldKind::List),
                ("s_grouped", QueryFieldKind::Grouped),
                ("s_aggregate", QueryFieldKind::Aggregate),
            ] {
                let name = format!("{}{}", prefix, suffix);
                fields.insert(
                    name.clone(),
                    QueryField {
                        name,
                        kind,
                        entity: Some(def.name.clone()),
                    },
                );
            }
            entities.insert(def.name.clone(), schema);
        }
        fields.insert(
            GENERAL_STATISTICS.to_string(),
            QueryField {
                name: GENERAL_STATISTICS.to_string(),
                kind: QueryFieldKind::Statistics,
                entity: None,
            },
        );
        let statistics = registry
            .statistics
            .iter()
            .map(|s| StatisticField {
                name: s.name.clone(),
                entity: s.entity.clone(),
            })
            .collect();
        tracing::info!(entities = entities.len(), fields = fields.len(), "schema built");
        Schema {
            entities,
            fields,
            statistics,
            registry,
        }
    }

    pub fn field(&self, name: &str) -> Option<&QueryField> {
        self.fields.get(name)
    }

    pub fn entity(&self, name: &str) -> Option<&EntitySchema> {
        self.entities.get(name)
    }
}
