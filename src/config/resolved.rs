//! Resolved entity registry: config validated and flattened for runtime use.

use crate::config::{Cardinality, RowStatisticKind, ScalarType, StatisticKind};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub scalar: ScalarType,
    pub nullable: bool,
}

/// Directed edge from the owning entity to `target`.
#[derive(Clone, Debug, PartialEq)]
pub struct RelationshipDef {
    pub name: String,
    pub target: String,
    pub cardinality: Cardinality,
    pub local_key: String,
    pub remote_key: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EntityDef {
    pub name: String,
    pub table_name: String,
    pub primary_key: String,
    /// Declaration order is kept: it drives column order and order-by field order.
    pub fields: Vec<FieldDef>,
    pub relationships: Vec<RelationshipDef>,
    pub statistics: Vec<RowStatisticDef>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RowStatisticDef {
    pub name: String,
    pub kind: RowStatisticKind,
    pub over: String,
    pub value: Option<String>,
}

impl EntityDef {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Case-insensitive field lookup used for caller-supplied paths.
    pub fn field_ignore_case(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn relationship_ignore_case(&self, name: &str) -> Option<&RelationshipDef> {
        self.relationships
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
    }

    pub fn statistic(&self, name: &str) -> Option<&RowStatisticDef> {
        self.statistics.iter().find(|s| s.name == name)
    }

    pub fn numeric_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.scalar.is_numeric())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StatisticDef {
    pub name: String,
    pub kind: StatisticKind,
    pub entity: String,
    pub value_path: String,
    pub per: Option<String>,
}

/// Closed set of entities, built once at startup and shared read-only.
#[derive(Clone, Debug, Default)]
pub struct EntityRegistry {
    pub entities: Vec<Arc<EntityDef>>,
    pub entity_by_name: HashMap<String, Arc<EntityDef>>,
    pub statistics: Vec<StatisticDef>,
}

impl EntityRegistry {
    pub fn entity(&self, name: &str) -> Option<&Arc<EntityDef>> {
        self.entity_by_name.get(name)
    }
}
