//! Dotted field paths ("item.category.name") resolved into join chains over the registry.

use crate::config::{is_identifier, EntityDef, EntityRegistry, RelationshipDef, ScalarType};
use crate::error::QueryError;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Alias of the entity the query originates from.
pub const ROOT_ALIAS: &str = "t0";

/// One join added for a relationship prefix of a requested path.
#[derive(Clone, Debug, PartialEq)]
pub struct JoinStep {
    /// Lowercased relationship prefix, e.g. "item" or "item.category".
    pub path_key: String,
    pub alias: String,
    pub parent_alias: String,
    pub target: Arc<EntityDef>,
    pub relationship: RelationshipDef,
}

/// Terminal column of a resolved path.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnRef {
    pub alias: String,
    pub column: String,
    pub scalar: ScalarType,
}

type PendingJoin = (String, Arc<EntityDef>, RelationshipDef);

fn split_path(path: &str) -> Result<Vec<&str>, QueryError> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| !is_identifier(s)) {
        return Err(QueryError::PathResolution(format!("invalid path '{}'", path)));
    }
    Ok(segments)
}

/// Joins accumulated for a set of paths from one root entity. Shared prefixes join once.
#[derive(Debug)]
pub struct JoinPlan<'r> {
    registry: &'r EntityRegistry,
    root: Arc<EntityDef>,
    joins: Vec<JoinStep>,
    alias_by_path: HashMap<String, usize>,
}

impl<'r> JoinPlan<'r> {
    pub fn new(registry: &'r EntityRegistry, root: Arc<EntityDef>) -> Self {
        JoinPlan {
            registry,
            root,
            joins: Vec::new(),
            alias_by_path: HashMap::new(),
        }
    }

    /// Walk `path` left to right: every segment but the last names a relationship on the
    /// entity reached so far, the last names a scalar field there.
    pub fn add_path(&mut self, path: &str) -> Result<ColumnRef, QueryError> {
        let segments = split_path(path)?;
        let (field_name, relationships) = segments
            .split_last()
            .ok_or_else(|| QueryError::PathResolution(format!("invalid path '{}'", path)))?;

        // Validate the whole chain before registering any join so a failure leaves no partial state.
        let (steps, current) = self.walk(path, relationships)?;
        let field = current
            .field_ignore_case(field_name)
            .ok_or_else(|| QueryError::FieldResolution {
                entity: current.name.clone(),
                field: (*field_name).to_string(),
            })?;
        let column = ColumnRef {
            alias: self.register(steps),
            column: field.name.clone(),
            scalar: field.scalar,
        };
        Ok(column)
    }

    /// Join a path made only of relationships, e.g. "purchases" or "item.category".
    /// Returns the alias and entity reached at its end.
    pub fn add_join_path(&mut self, path: &str) -> Result<(String, Arc<EntityDef>), QueryError> {
        let segments = split_path(path)?;
        let (steps, current) = self.walk(path, &segments)?;
        if steps.is_empty() {
            return Err(QueryError::PathResolution(format!("'{}' names no relationship", path)));
        }
        Ok((self.register(steps), current))
    }

    fn walk(&self, path: &str, relationships: &[&str]) -> Result<(Vec<PendingJoin>, Arc<EntityDef>), QueryError> {
        let registry = self.registry;
        let mut steps: Vec<PendingJoin> = Vec::new();
        let mut visited: HashSet<&str> = HashSet::from([self.root.name.as_str()]);
        let mut current = self.root.clone();
        let mut prefix = String::new();
        for (i, segment) in relationships.iter().enumerate() {
            let rel = current.relationship_ignore_case(segment).ok_or_else(|| {
                QueryError::PathResolution(format!(
                    "relationship '{}' not found on {}",
                    segment, current.name
                ))
            })?;
            if i == 0 && rel.target == self.root.name {
                return Err(QueryError::PathResolution(format!(
                    "'{}' joins {} back onto itself",
                    path, self.root.name
                )));
            }
            let target = registry.entity(&rel.target).ok_or_else(|| {
                QueryError::PathResolution(format!("entity '{}' is not registered", rel.target))
            })?;
            if !visited.insert(target.name.as_str()) {
                return Err(QueryError::PathResolution(format!(
                    "'{}' revisits {}",
                    path, target.name
                )));
            }
            if !prefix.is_empty() {
                prefix.push('.');
            }
            prefix.push_str(&segment.to_ascii_lowercase());
            steps.push((prefix.clone(), target.clone(), rel.clone()));
            current = target.clone();
        }
        Ok((steps, current))
    }

    /// Adds joins not yet present and returns the alias of the last one (root alias if none).
    fn register(&mut self, steps: Vec<PendingJoin>) -> String {
        let mut parent_alias = ROOT_ALIAS.to_string();
        for (path_key, target, relationship) in steps {
            let idx = match self.alias_by_path.get(&path_key) {
                Some(idx) => *idx,
                None => {
                    let idx = self.joins.len();
                    self.joins.push(JoinStep {
                        path_key: path_key.clone(),
                        alias: format!("t{}", idx + 1),
                        parent_alias: parent_alias.clone(),
                        target,
                        relationship,
                    });
                    self.alias_by_path.insert(path_key, idx);
                    idx
                }
            };
            parent_alias = self.joins[idx].alias.clone();
        }
        parent_alias
    }

    pub fn root(&self) -> &Arc<EntityDef> {
        &self.root
    }

    pub fn into_joins(self) -> Vec<JoinStep> {
        self.joins
    }
}

/// Resolve every group-by path against `root`. Fails on the first unresolvable path.
pub fn resolve_paths(
    registry: &EntityRegistry,
    root: Arc<EntityDef>,
    paths: &[String],
) -> Result<(Vec<JoinStep>, Vec<ColumnRef>), QueryError> {
    let mut plan = JoinPlan::new(registry, root);
    let columns = paths
        .iter()
        .map(|p| plan.add_path(p))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((plan.into_joins(), columns))
}
