//! Query surface handlers: one request, one session, one selected field.

use crate::error::{AppError, QueryError};
use crate::response::{success_one_ok, success_many};
use crate::schema::QueryField;
use crate::service::{Executor, FieldRequest};
use crate::session::PgSession;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    response::IntoResponse,
};

pub async fn execute(
    State(state): State<AppState>,
    Path(field): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    if state.schema.field(&field).is_none() {
        return Err(QueryError::UnknownField(field).into());
    }
    let request: FieldRequest = if body.iter().all(u8::is_ascii_whitespace) {
        FieldRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(format!("invalid request body: {}", e)))?
    };
    let mut session = PgSession::acquire(&state.pool, state.statement_timeout).await?;
    let data = Executor::new(&state.schema)
        .execute(&mut session, &field, &request)
        .await?;
    Ok(success_one_ok(data))
}

pub async fn schema(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let value = serde_json::to_value(&*state.schema).map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(success_one_ok(value))
}

pub async fn fields(State(state): State<AppState>) -> impl IntoResponse {
    let fields: Vec<QueryField> = state.schema.fields.values().cloned().collect();
    success_many(fields)
}
