//! Raw registry config types matching the entities JSON document.

use serde::{Deserialize, Serialize};

/// Scalar column kinds an entity field may declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    String,
    Int,
    Float,
    Bool,
    #[serde(alias = "timestamp", alias = "timestamptz")]
    Datetime,
}

impl ScalarType {
    /// Integer or floating-point: eligible for sum/min/max/avg.
    pub fn is_numeric(self) -> bool {
        matches!(self, ScalarType::Int | ScalarType::Float)
    }

    /// String, number or boolean: eligible for ordering in the order-by input.
    pub fn is_primitive(self) -> bool {
        !matches!(self, ScalarType::Datetime)
    }

    /// PostgreSQL column type used for DDL.
    pub fn pg_type(self) -> &'static str {
        match self {
            ScalarType::String => "TEXT",
            ScalarType::Int => "BIGINT",
            ScalarType::Float => "DOUBLE PRECISION",
            ScalarType::Bool => "BOOLEAN",
            ScalarType::Datetime => "TIMESTAMPTZ",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    ToOne,
    ToMany,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: ScalarType,
    #[serde(default)]
    pub nullable: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationshipConfig {
    pub name: String,
    pub target: String,
    pub cardinality: Cardinality,
    /// Column on this entity used in the join (our FK for to_one; our PK for to_many).
    pub local_key: String,
    /// Column on the target entity used in the join.
    pub remote_key: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityConfig {
    pub name: String,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
    #[serde(default)]
    pub relationships: Vec<RelationshipConfig>,
    /// Statistics computed for each row of this entity.
    #[serde(default)]
    pub statistics: Vec<RowStatisticConfig>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatisticKind {
    /// SUM(value) over the related rows.
    Sum,
    /// COUNT of the related rows.
    Count,
    /// The related row with the largest value, or null.
    MaxRow,
}

/// Per-row statistic: related rows reached through `over`, keyed on the row's primary key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RowStatisticConfig {
    pub name: String,
    pub kind: RowStatisticKind,
    /// Relationship path from the entity, e.g. "purchases".
    pub over: String,
    /// Numeric field path from the entity; required for sum and max_row.
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticKind {
    /// SUM(value) over the whole entity set.
    Total,
    /// SUM(value) / COUNT(DISTINCT per).
    AvgPerDistinct,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatisticConfig {
    pub name: String,
    pub kind: StatisticKind,
    pub entity: String,
    /// Dotted path to a numeric field, possibly through relationships (e.g. "item.price").
    pub value: String,
    /// Field on `entity` counted distinctly; required for avg_per_distinct.
    #[serde(default)]
    pub per: Option<String>,
}

/// Whole registry document as loaded from disk.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
    #[serde(default)]
    pub statistics: Vec<StatisticConfig>,
}
