//! Fixtures shared by unit tests.

use crate::config::{parse, resolve, EntityRegistry};
use crate::error::QueryError;
use crate::session::DataSession;
use crate::sql::QueryBuf;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;

/// The shipped registry: User, Category, Item, Purchase and two statistics.
pub fn sample() -> EntityRegistry {
    resolve(&parse(include_str!("../config/entities.json")).unwrap()).unwrap()
}

/// Sample shape plus a User -> User edge for self-join checks.
pub fn shop() -> EntityRegistry {
    let mut config = parse(include_str!("../config/entities.json")).unwrap();
    let user = config.entities.iter_mut().find(|e| e.name == "User").unwrap();
    user.relationships.push(crate::config::RelationshipConfig {
        name: "referrer".into(),
        target: "User".into(),
        cardinality: crate::config::Cardinality::ToOne,
        local_key: "id".into(),
        remote_key: "id".into(),
    });
    resolve(&config).unwrap()
}

/// Replays canned results in call order and records every query it receives.
#[derive(Default)]
pub struct ScriptedSession {
    rows: VecDeque<Vec<Value>>,
    scalars: VecDeque<Value>,
    fail: bool,
    pub executed: Vec<QueryBuf>,
}

impl ScriptedSession {
    pub fn new(scalars: Vec<Value>) -> Self {
        Self::with_rows(vec![], scalars)
    }

    pub fn with_rows(rows: Vec<Vec<Value>>, scalars: Vec<Value>) -> Self {
        ScriptedSession {
            rows: rows.into(),
            scalars: scalars.into(),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        ScriptedSession {
            fail: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl DataSession for ScriptedSession {
    async fn fetch_rows(&mut self, q: &QueryBuf) -> Result<Vec<Value>, QueryError> {
        self.executed.push(q.clone());
        if self.fail {
            return Err(QueryError::Store(sqlx::Error::PoolTimedOut));
        }
        Ok(self.rows.pop_front().unwrap_or_default())
    }

    async fn fetch_scalar(&mut self, q: &QueryBuf) -> Result<Option<Value>, QueryError> {
        self.executed.push(q.clone());
        if self.fail {
            return Err(QueryError::Store(sqlx::Error::PoolTimedOut));
        }
        Ok(self.scalars.pop_front())
    }
}
