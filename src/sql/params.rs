//! Typed bind values for PostgreSQL, converted from decoded row JSON.

use crate::config::ScalarType;
use crate::error::QueryError;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::Database;

/// A value bound to a `$n` placeholder. Each variant encodes with its own wire type.
#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Timestamp(DateTime<Utc>),
}

impl PgBindValue {
    /// Convert a non-null JSON cell into the bind type of a column. `None` for JSON null.
    pub fn from_json(v: &Value, scalar: ScalarType) -> Result<Option<Self>, QueryError> {
        if v.is_null() {
            return Ok(None);
        }
        let mismatch = || QueryError::InvalidArgument(format!("value {} is not a {:?}", v, scalar));
        Ok(Some(match scalar {
            ScalarType::Bool => PgBindValue::Bool(v.as_bool().ok_or_else(mismatch)?),
            ScalarType::Int => PgBindValue::I64(v.as_i64().ok_or_else(mismatch)?),
            ScalarType::Float => PgBindValue::F64(v.as_f64().ok_or_else(mismatch)?),
            ScalarType::String => PgBindValue::String(v.as_str().ok_or_else(mismatch)?.to_string()),
            ScalarType::Datetime => {
                let s = v.as_str().ok_or_else(mismatch)?;
                let ts = DateTime::parse_from_rfc3339(s)
                    .map(|d| d.with_timezone(&Utc))
                    .map_err(|_| mismatch())?;
                PgBindValue::Timestamp(ts)
            }
        }))
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        match self {
            PgBindValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf),
            PgBindValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf),
            PgBindValue::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf),
            PgBindValue::String(s) => <String as Encode<Postgres>>::encode_by_ref(s, buf),
            PgBindValue::Timestamp(t) => <DateTime<Utc> as Encode<Postgres>>::encode_by_ref(t, buf),
        }
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(match self {
            PgBindValue::Bool(_) => <bool as sqlx::Type<Postgres>>::type_info(),
            PgBindValue::I64(_) => <i64 as sqlx::Type<Postgres>>::type_info(),
            PgBindValue::F64(_) => <f64 as sqlx::Type<Postgres>>::type_info(),
            PgBindValue::String(_) => <String as sqlx::Type<Postgres>>::type_info(),
            PgBindValue::Timestamp(_) => <DateTime<Utc> as sqlx::Type<Postgres>>::type_info(),
        })
    }
}

impl sqlx::Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }

    fn compatible(_ty: &PgTypeInfo) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_cells_by_column_type() {
        assert_eq!(
            PgBindValue::from_json(&json!(3), ScalarType::Int).unwrap(),
            Some(PgBindValue::I64(3))
        );
        assert_eq!(
            PgBindValue::from_json(&json!(2), ScalarType::Float).unwrap(),
            Some(PgBindValue::F64(2.0))
        );
        assert_eq!(
            PgBindValue::from_json(&json!("Pen"), ScalarType::String).unwrap(),
            Some(PgBindValue::String("Pen".into()))
        );
        assert_eq!(PgBindValue::from_json(&Value::Null, ScalarType::String).unwrap(), None);
    }

    #[test]
    fn parses_rfc3339_timestamps() {
        let v = PgBindValue::from_json(&json!("2024-01-02T03:04:05+00:00"), ScalarType::Datetime)
            .unwrap()
            .unwrap();
        assert!(matches!(v, PgBindValue::Timestamp(_)));
    }

    #[test]
    fn rejects_mismatched_cells() {
        let err = PgBindValue::from_json(&json!("ten"), ScalarType::Int).unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument(_)));
    }
}
