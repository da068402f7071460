//! Per-entity aggregate surface: sum/min/max/avg sub-objects over numeric fields, plus count.

use crate::config::EntityDef;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateOp {
    Sum,
    Min,
    Max,
    Avg,
}

impl AggregateOp {
    pub const ALL: [AggregateOp; 4] = [AggregateOp::Sum, AggregateOp::Min, AggregateOp::Max, AggregateOp::Avg];

    pub fn name(self) -> &'static str {
        match self {
            AggregateOp::Sum => "sum",
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
            AggregateOp::Avg => "avg",
        }
    }

    fn type_suffix(self) -> &'static str {
        match self {
            AggregateOp::Sum => "Sum",
            AggregateOp::Min => "Min",
            AggregateOp::Max => "Max",
            AggregateOp::Avg => "Avg",
        }
    }
}

/// One named sub-object, e.g. `ItemSum { id, price }`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AggregateOpGroup {
    pub op: AggregateOp,
    pub type_name: String,
    pub fields: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AggregateType {
    pub name: String,
    pub groups: Vec<AggregateOpGroup>,
}

impl AggregateType {
    pub fn from_entity(entity: &EntityDef) -> Self {
        let numeric: Vec<String> = entity.numeric_fields().map(|f| f.name.clone()).collect();
        AggregateType {
            name: format!("{}Aggregate", entity.name),
            groups: AggregateOp::ALL
                .iter()
                .map(|op| AggregateOpGroup {
                    op: *op,
                    type_name: format!("{}{}", entity.name, op.type_suffix()),
                    fields: numeric.clone(),
                })
                .collect(),
        }
    }

    pub fn group(&self, op: AggregateOp) -> Option<&AggregateOpGroup> {
        self.groups.iter().find(|g| g.op == op)
    }

    pub fn supports(&self, op: AggregateOp, field: &str) -> bool {
        self.group(op).is_some_and(|g| g.fields.iter().any(|f| f == field))
    }
}
