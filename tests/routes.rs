use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use entity_query_sdk::{parse, query_routes, resolve, AppState, Schema};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

// The pool never connects: every request below is answered before a session is acquired.
fn app() -> Router {
    let registry = resolve(&parse(include_str!("../config/entities.json")).unwrap()).unwrap();
    let pool = sqlx::postgres::PgPoolOptions::new()
        .connect_lazy("postgres://localhost/entity_query_unused")
        .unwrap();
    let state = AppState {
        pool,
        schema: Arc::new(Schema::build(Arc::new(registry))),
        statement_timeout: None,
    };
    Router::new().nest("/api/v1", query_routes(state))
}

async fn json_body(res: axum::response::Response) -> Value {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn schema_lists_every_surface_field() {
    let res = app()
        .oneshot(Request::get("/api/v1/schema").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    let fields = body["data"]["fields"].as_object().unwrap();
    assert_eq!(fields.len(), 13);
    assert!(fields.contains_key("purchases_grouped"));
    assert_eq!(fields["general_statistics"]["kind"], "statistics");
    assert_eq!(body["data"]["entities"]["Item"]["aggregate_type"]["name"], "ItemAggregate");
}

#[tokio::test]
async fn unknown_field_is_not_found() {
    let res = app()
        .oneshot(
            Request::post("/api/v1/query/widgets")
                .header("content-type", "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(res).await["error"]["code"], "not_found");
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let res = app()
        .oneshot(
            Request::post("/api/v1/query/users")
                .header("content-type", "application/json")
                .body(Body::from("{\"limit\": \"ten\"}"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(res).await["error"]["code"], "bad_request");
}

#[tokio::test]
async fn field_list_includes_general_statistics() {
    let res = app()
        .oneshot(Request::get("/api/v1/schema/fields").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert_eq!(names.len(), 13);
    assert!(names.contains(&"general_statistics"));
}
