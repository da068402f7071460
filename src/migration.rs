//! Apply the entity registry to the database: one table per entity, then foreign keys for to-one edges.
//! Also creates the target database itself when missing.

use crate::config::{Cardinality, EntityDef, EntityRegistry, ScalarType};
use crate::error::{AppError, ConfigError};
use crate::sql::quoted;
use sqlx::ConnectOptions;
use sqlx::PgPool;
use std::str::FromStr;

/// `CREATE TABLE IF NOT EXISTS` for one entity. Integer primary keys become identity columns.
pub fn table_ddl(entity: &EntityDef) -> String {
    let mut col_defs: Vec<String> = Vec::new();
    for f in &entity.fields {
        let mut def = format!("{} {}", quoted(&f.name), f.scalar.pg_type());
        if f.name == entity.primary_key {
            if f.scalar == ScalarType::Int {
                def.push_str(" GENERATED BY DEFAULT AS IDENTITY");
            }
            def.push_str(" PRIMARY KEY");
        } else if !f.nullable {
            def.push_str(" NOT NULL");
        }
        col_defs.push(def);
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        quoted(&entity.table_name),
        col_defs.join(",\n  ")
    )
}

/// `ALTER TABLE .. ADD CONSTRAINT` for every to-one relationship whose remote key is the target's primary key.
pub fn foreign_key_ddl(registry: &EntityRegistry) -> Vec<String> {
    let mut out = Vec::new();
    for entity in &registry.entities {
        for rel in &entity.relationships {
            if rel.cardinality != Cardinality::ToOne {
                continue;
            }
            let Some(target) = registry.entity(&rel.target) else {
                continue;
            };
            if rel.remote_key != target.primary_key || rel.local_key == entity.primary_key {
                continue;
            }
            out.push(format!(
                "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
                quoted(&entity.table_name),
                quoted(&format!("fk_{}_{}", entity.table_name, rel.name)),
                quoted(&rel.local_key),
                quoted(&target.table_name),
                quoted(&rel.remote_key)
            ));
        }
    }
    out
}

/// Create every entity table, then add foreign keys. Idempotent: tables use IF NOT EXISTS and
/// constraint failures (usually "already exists") are logged and skipped.
pub async fn apply_migrations(pool: &PgPool, registry: &EntityRegistry) -> Result<(), AppError> {
    for entity in &registry.entities {
        sqlx::query(&table_ddl(entity)).execute(pool).await?;
        tracing::info!(entity = %entity.name, table = %entity.table_name, "table ensured");
    }
    for sql in foreign_key_ddl(registry) {
        if let Err(e) = sqlx::query(&sql).execute(pool).await {
            tracing::debug!(error = %e, sql = %sql, "foreign key skipped");
        }
    }
    Ok(())
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| ConfigError::Settings(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await.map_err(AppError::Db)?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await
        .map_err(AppError::Db)?;
    if !exists.0 {
        sqlx::query(&format!("CREATE DATABASE {}", quoted(&db_name)))
            .execute(&mut conn)
            .await
            .map_err(AppError::Db)?;
        tracing::info!(database = %db_name, "database created");
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), ConfigError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| ConfigError::Settings("DATABASE_URL: no path".into()))?
        + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    Ok((format!("{}postgres", base), db_name.to_string()))
}
