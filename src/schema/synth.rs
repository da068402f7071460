//! Per-entity derived shapes: entity type, order-by input, group key.
//! Built purely from registry metadata; row data is never inspected.

use crate::config::{Cardinality, EntityDef, ScalarType};
use crate::error::QueryError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field descriptor walked by the schema build.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldDescriptor {
    Scalar {
        name: String,
        #[serde(rename = "type")]
        scalar: ScalarType,
        nullable: bool,
    },
    Relationship {
        name: String,
        target: String,
        cardinality: Cardinality,
    },
}

impl FieldDescriptor {
    pub fn name(&self) -> &str {
        match self {
            FieldDescriptor::Scalar { name, .. } | FieldDescriptor::Relationship { name, .. } => name,
        }
    }
}

pub fn describe(entity: &EntityDef) -> Vec<FieldDescriptor> {
    let scalars = entity.fields.iter().map(|f| FieldDescriptor::Scalar {
        name: f.name.clone(),
        scalar: f.scalar,
        nullable: f.nullable,
    });
    let relationships = entity.relationships.iter().map(|r| FieldDescriptor::Relationship {
        name: r.name.clone(),
        target: r.target.clone(),
        cardinality: r.cardinality,
    });
    scalars.chain(relationships).collect()
}

/// Public row shape: every scalar field, names and types unchanged.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntityType {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

impl EntityType {
    pub fn from_descriptors(entity_name: &str, descriptors: &[FieldDescriptor]) -> Self {
        EntityType {
            name: entity_name.to_string(),
            fields: descriptors
                .iter()
                .filter(|d| matches!(d, FieldDescriptor::Scalar { .. }))
                .cloned()
                .collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
    #[default]
    Unset,
}

/// Order specification: (field, direction) in caller sequence.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrderSpec(pub Vec<(String, SortDirection)>);

impl OrderSpec {
    /// Specified terms only, sequence preserved.
    pub fn terms(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().filter_map(|(f, d)| match d {
            SortDirection::Asc => Some((f.as_str(), false)),
            SortDirection::Desc => Some((f.as_str(), true)),
            SortDirection::Unset => None,
        })
    }
}

/// `OrderBy<Entity>` input: each primitive scalar field as an optional direction.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderByType {
    pub name: String,
    pub fields: Vec<String>,
}

impl OrderByType {
    pub fn from_descriptors(entity_name: &str, descriptors: &[FieldDescriptor]) -> Self {
        OrderByType {
            name: format!("OrderBy{}", entity_name),
            fields: descriptors
                .iter()
                .filter_map(|d| match d {
                    FieldDescriptor::Scalar { name, scalar, .. } if scalar.is_primitive() => Some(name.clone()),
                    _ => None,
                })
                .collect(),
        }
    }

    /// Parse a list of order-by objects. Within one object, fields follow this type's declared
    /// order; objects follow the list order. Missing or null fields are `Unset`.
    pub fn parse(&self, input: &Value) -> Result<OrderSpec, QueryError> {
        let items = match input {
            Value::Null => return Ok(OrderSpec::default()),
            Value::Array(items) => items.as_slice(),
            Value::Object(_) => std::slice::from_ref(input),
            _ => return Err(QueryError::InvalidArgument("order_by must be a list of objects".into())),
        };
        let mut spec = Vec::new();
        for item in items {
            let obj = item
                .as_object()
                .ok_or_else(|| QueryError::InvalidArgument("order_by entries must be objects".into()))?;
            if let Some(unknown) = obj.keys().find(|k| !self.fields.contains(k)) {
                return Err(QueryError::InvalidArgument(format!(
                    "{} has no field '{}'",
                    self.name, unknown
                )));
            }
            for field in &self.fields {
                let direction = match obj.get(field) {
                    None | Some(Value::Null) => SortDirection::Unset,
                    Some(v) => serde_json::from_value(v.clone()).map_err(|_| {
                        QueryError::InvalidArgument(format!("invalid direction {} for '{}'", v, field))
                    })?,
                };
                spec.push((field.clone(), direction));
            }
        }
        Ok(OrderSpec(spec))
    }
}

/// One (path, value) pair identifying a group; shared by every entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GroupKey {
    pub name: String,
    pub value: String,
}

impl GroupKey {
    pub fn new(name: &str, value: &Value) -> Self {
        let value = match value {
            Value::String(s) => s.clone(),
            Value::Null => "null".to_string(),
            other => other.to_string(),
        };
        GroupKey {
            name: name.to_string(),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample;
    use serde_json::json;

    #[test]
    fn entity_type_copies_scalars_only() {
        let reg = sample();
        let item = reg.entity("Item").unwrap();
        let t = EntityType::from_descriptors(&item.name, &describe(item));
        let names: Vec<_> = t.fields.iter().map(|f| f.name()).collect();
        assert_eq!(names, ["id", "name", "price", "expiration_date", "category_id"]);
    }

    #[test]
    fn order_by_excludes_datetime_and_relationships() {
        let reg = sample();
        let item = reg.entity("Item").unwrap();
        let t = OrderByType::from_descriptors(&item.name, &describe(item));
        assert_eq!(t.name, "OrderByItem");
        assert_eq!(t.fields, ["id", "name", "price", "category_id"]);
    }

    #[test]
    fn parse_keeps_object_sequence_and_drops_unset() {
        let reg = sample();
        let user = reg.entity("User").unwrap();
        let t = OrderByType::from_descriptors(&user.name, &describe(user));
        let spec = t
            .parse(&json!([{"name": "desc"}, {"id": "asc", "age": null}]))
            .unwrap();
        let terms: Vec<_> = spec.terms().collect();
        assert_eq!(terms, [("name", true), ("id", false)]);
    }

    #[test]
    fn all_unset_yields_no_terms() {
        let reg = sample();
        let user = reg.entity("User").unwrap();
        let t = OrderByType::from_descriptors(&user.name, &describe(user));
        let spec = t.parse(&json!([{"name": "unset"}, {}])).unwrap();
        assert_eq!(spec.terms().count(), 0);
    }

    #[test]
    fn parse_rejects_unknown_field_and_direction() {
        let reg = sample();
        let user = reg.entity("User").unwrap();
        let t = OrderByType::from_descriptors(&user.name, &describe(user));
        assert!(t.parse(&json!([{"purchases": "asc"}])).is_err());
        assert!(t.parse(&json!([{"name": "sideways"}])).is_err());
        assert!(t.parse(&json!("name")).is_err());
    }

    #[test]
    fn group_key_stringifies_values() {
        assert_eq!(GroupKey::new("item.name", &json!("Pen")).value, "Pen");
        assert_eq!(GroupKey::new("item.price", &json!(2.5)).value, "2.5");
        assert_eq!(GroupKey::new("user.age", &Value::Null).value, "null");
    }
}
