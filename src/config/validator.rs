//! Registry validation: identifiers, referential integrity and join keys.

use crate::config::{RegistryConfig, StatisticKind};
use crate::error::ConfigError;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"))
}

pub fn is_identifier(s: &str) -> bool {
    identifier_re().is_match(s)
}

fn check_identifier(kind: &'static str, name: &str) -> Result<(), ConfigError> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier {
            kind,
            name: name.to_string(),
        })
    }
}

pub fn validate(config: &RegistryConfig) -> Result<(), ConfigError> {
    let mut entity_names = HashSet::new();
    for e in &config.entities {
        check_identifier("entity", &e.name)?;
        if let Some(table) = &e.table {
            check_identifier("table", table)?;
        }
        if !entity_names.insert(e.name.as_str()) {
            return Err(ConfigError::Duplicate {
                kind: "entity",
                name: e.name.clone(),
            });
        }
        if e.fields.is_empty() {
            return Err(ConfigError::NoFields(e.name.clone()));
        }
    }

    let fields_by_entity: HashMap<&str, HashSet<&str>> = config
        .entities
        .iter()
        .map(|e| (e.name.as_str(), e.fields.iter().map(|f| f.name.as_str()).collect()))
        .collect();

    for e in &config.entities {
        let own = &fields_by_entity[e.name.as_str()];
        let mut seen = HashSet::new();
        for f in &e.fields {
            check_identifier("field", &f.name)?;
            if !seen.insert(f.name.to_ascii_lowercase()) {
                return Err(ConfigError::Duplicate {
                    kind: "field",
                    name: format!("{}.{}", e.name, f.name),
                });
            }
        }
        let pk = e.primary_key.as_deref().unwrap_or("id");
        if !own.contains(pk) {
            return Err(ConfigError::MissingReference {
                kind: "primary key",
                id: format!("{}.{}", e.name, pk),
            });
        }

        let mut rel_names = HashSet::new();
        for r in &e.relationships {
            check_identifier("relationship", &r.name)?;
            if !rel_names.insert(r.name.to_ascii_lowercase()) || seen.contains(&r.name.to_ascii_lowercase()) {
                return Err(ConfigError::Duplicate {
                    kind: "relationship",
                    name: format!("{}.{}", e.name, r.name),
                });
            }
            let target = fields_by_entity
                .get(r.target.as_str())
                .ok_or_else(|| ConfigError::MissingReference {
                    kind: "relationship target",
                    id: format!("{}.{} -> {}", e.name, r.name, r.target),
                })?;
            if !own.contains(r.local_key.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "join key",
                    id: format!("{}.{}", e.name, r.local_key),
                });
            }
            if !target.contains(r.remote_key.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "join key",
                    id: format!("{}.{}", r.target, r.remote_key),
                });
            }
        }

        let mut stat_names = HashSet::new();
        for st in &e.statistics {
            check_identifier("statistic", &st.name)?;
            if !stat_names.insert(st.name.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "statistic",
                    name: format!("{}.{}", e.name, st.name),
                });
            }
        }
    }

    let mut stat_names = HashSet::new();
    for s in &config.statistics {
        check_identifier("statistic", &s.name)?;
        if !stat_names.insert(s.name.as_str()) {
            return Err(ConfigError::Duplicate {
                kind: "statistic",
                name: s.name.clone(),
            });
        }
        let own = fields_by_entity
            .get(s.entity.as_str())
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "statistic entity",
                id: s.entity.clone(),
            })?;
        match (s.kind, s.per.as_deref()) {
            (StatisticKind::AvgPerDistinct, None) => {
                return Err(ConfigError::InvalidStatistic {
                    name: s.name.clone(),
                    reason: "avg_per_distinct requires 'per'".into(),
                })
            }
            (_, Some(per)) if !own.contains(per) => {
                return Err(ConfigError::InvalidStatistic {
                    name: s.name.clone(),
                    reason: format!("unknown field '{}' on {}", per, s.entity),
                })
            }
            _ => {}
        }
    }

    Ok(())
}
