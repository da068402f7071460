//! Request-scoped data session: the only place queries meet the store.

use crate::error::QueryError;
use crate::sql::QueryBuf;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres};
use std::time::Duration;

/// Execute built queries. One instance serves one request and is used sequentially.
#[async_trait]
pub trait DataSession: Send {
    /// Rows as JSON objects keyed by column name, in result order.
    async fn fetch_rows(&mut self, q: &QueryBuf) -> Result<Vec<Value>, QueryError>;

    /// First column of the first row; None when there is no row.
    async fn fetch_scalar(&mut self, q: &QueryBuf) -> Result<Option<Value>, QueryError>;
}

/// PostgreSQL session holding one pooled connection until dropped.
pub struct PgSession {
    conn: PoolConnection<Postgres>,
}

impl PgSession {
    pub async fn acquire(pool: &PgPool, statement_timeout: Option<Duration>) -> Result<Self, QueryError> {
        let mut conn = pool.acquire().await?;
        if let Some(t) = statement_timeout {
            sqlx::query(&format!("SET statement_timeout = {}", t.as_millis()))
                .execute(&mut *conn)
                .await?;
        }
        Ok(PgSession { conn })
    }
}

fn bind_all<'q>(q: &'q QueryBuf) -> Query<'q, Postgres, PgArguments> {
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    query
}

#[async_trait]
impl DataSession for PgSession {
    async fn fetch_rows(&mut self, q: &QueryBuf) -> Result<Vec<Value>, QueryError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = bind_all(q).fetch_all(&mut *self.conn).await.map_err(|e| {
            tracing::warn!(sql = %q.sql, error = %e, "query failed");
            QueryError::Store(e)
        })?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn fetch_scalar(&mut self, q: &QueryBuf) -> Result<Option<Value>, QueryError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "scalar query");
        let row = bind_all(q).fetch_optional(&mut *self.conn).await.map_err(|e| {
            tracing::warn!(sql = %q.sql, error = %e, "query failed");
            QueryError::Store(e)
        })?;
        Ok(row.map(|r| {
            use sqlx::{Column, Row};
            match r.columns().first() {
                Some(col) => cell_to_value(&r, col.ordinal()),
                None => Value::Null,
            }
        }))
    }
}

fn row_to_json(row: &PgRow) -> Value {
    use sqlx::{Column, Row};
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        map.insert(col.name().to_string(), cell_to_value(row, col.ordinal()));
    }
    Value::Object(map)
}

fn cell_to_value(row: &PgRow, idx: usize) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(idx) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(idx) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(idx) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(idx) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(idx) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(idx) {
        return Value::Bool(b);
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
        return Value::String(d.and_utc().to_rfc3339());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(idx) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(idx) {
        return j;
    }
    Value::Null
}
