use async_trait::async_trait;
use entity_query_sdk::sql::{PgBindValue, QueryBuf};
use entity_query_sdk::{parse, resolve, DataSession, Executor, FieldRequest, QueryError, Schema};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;

/// Replays canned rows and scalars in call order.
#[derive(Default)]
struct Replay {
    rows: VecDeque<Vec<Value>>,
    scalars: VecDeque<Value>,
    executed: Vec<QueryBuf>,
}

#[async_trait]
impl DataSession for Replay {
    async fn fetch_rows(&mut self, q: &QueryBuf) -> Result<Vec<Value>, QueryError> {
        self.executed.push(q.clone());
        Ok(self.rows.pop_front().unwrap_or_default())
    }

    async fn fetch_scalar(&mut self, q: &QueryBuf) -> Result<Option<Value>, QueryError> {
        self.executed.push(q.clone());
        Ok(self.scalars.pop_front())
    }
}

fn schema() -> Schema {
    let config = parse(include_str!("../config/entities.json")).unwrap();
    Schema::build(Arc::new(resolve(&config).unwrap()))
}

fn request(v: Value) -> FieldRequest {
    serde_json::from_value(v).unwrap()
}

#[tokio::test]
async fn purchases_grouped_by_item_name() {
    let schema = schema();
    let mut session = Replay {
        rows: VecDeque::from(vec![
            vec![json!({"g0": "Pen"}), json!({"g0": "Cup"})],
            vec![
                json!({"id": 1, "user_id": 1, "item_id": 1}),
                json!({"id": 2, "user_id": 2, "item_id": 1}),
            ],
            vec![json!({"id": 3, "user_id": 1, "item_id": 2})],
        ]),
        scalars: VecDeque::from(vec![json!(2), json!(1)]),
        ..Default::default()
    };
    let req = request(json!({
        "group_by": ["item.name"],
        "select": {"nodes": true, "aggregate": {"count": true}}
    }));

    let out = Executor::new(&schema)
        .execute(&mut session, "purchases_grouped", &req)
        .await
        .unwrap();

    assert_eq!(
        out,
        json!([
            {
                "keys": [{"name": "item.name", "value": "Pen"}],
                "nodes": [
                    {"id": 1, "user_id": 1, "item_id": 1},
                    {"id": 2, "user_id": 2, "item_id": 1}
                ],
                "aggregate": {"count": 2}
            },
            {
                "keys": [{"name": "item.name", "value": "Cup"}],
                "nodes": [{"id": 3, "user_id": 1, "item_id": 2}],
                "aggregate": {"count": 1}
            }
        ])
    );
    assert_eq!(
        session.executed[0].sql,
        r#"SELECT t1."name" AS "g0" FROM "purchase" t0 JOIN "item" t1 ON t1."id" = t0."item_id" GROUP BY t1."name""#
    );
    assert!(session.executed[1].sql.ends_with(r#" WHERE t1."name" = $1"#));
    assert_eq!(session.executed[1].params, vec![PgBindValue::String("Pen".into())]);
    assert_eq!(session.executed[3].params, vec![PgBindValue::String("Cup".into())]);
}

#[tokio::test]
async fn users_paged_by_offset_and_limit() {
    let schema = schema();
    let mut session = Replay {
        rows: VecDeque::from(vec![vec![json!({"id": 3}), json!({"id": 4}), json!({"id": 5})]]),
        ..Default::default()
    };
    let req = request(json!({"order_by": [{"id": "asc"}], "offset": 2, "limit": 3}));

    let out = Executor::new(&schema).execute(&mut session, "users", &req).await.unwrap();

    let ids: Vec<i64> = out
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![3, 4, 5]);
    assert_eq!(
        session.executed[0].sql,
        r#"SELECT t0."id", t0."name", t0."age" FROM "user" t0 ORDER BY t0."id" LIMIT 3 OFFSET 2"#
    );
}

#[tokio::test]
async fn negative_limit_is_rejected_before_execution() {
    let schema = schema();
    let mut session = Replay::default();
    let err = Executor::new(&schema)
        .execute(&mut session, "users", &request(json!({"limit": -1})))
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::InvalidArgument(_)));
    assert!(session.executed.is_empty());
}

#[tokio::test]
async fn unknown_field_is_reported() {
    let schema = schema();
    let mut session = Replay::default();
    let err = Executor::new(&schema)
        .execute(&mut session, "widgets", &FieldRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::UnknownField(f) if f == "widgets"));
}

#[tokio::test]
async fn bad_group_path_fails_without_touching_the_store() {
    let schema = schema();
    let mut session = Replay::default();
    let err = Executor::new(&schema)
        .execute(&mut session, "purchases_grouped", &request(json!({"group_by": ["item.colour"]})))
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::PathResolution(_) | QueryError::FieldResolution { .. }));
    assert!(session.executed.is_empty());
}

#[tokio::test]
async fn aggregate_over_empty_set_is_zero() {
    let schema = schema();
    let mut session = Replay::default();
    let req = request(json!({
        "select": {"aggregate": {"count": true, "sum": ["price"], "avg": ["price"]}}
    }));

    let out = Executor::new(&schema)
        .execute(&mut session, "items_aggregate", &req)
        .await
        .unwrap();

    assert_eq!(out, json!({"count": 0, "sum": {"price": 0.0}, "avg": {"price": 0.0}}));
}

#[tokio::test]
async fn aggregate_rejects_non_numeric_field() {
    let schema = schema();
    let mut session = Replay::default();
    let req = request(json!({"select": {"aggregate": {"sum": ["name"]}}}));
    let err = Executor::new(&schema)
        .execute(&mut session, "items_aggregate", &req)
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::InvalidArgument(_)));
}

#[tokio::test]
async fn general_statistics_reports_every_configured_value() {
    let schema = schema();
    let mut session = Replay {
        scalars: VecDeque::from(vec![json!(30.0), json!(30.0), json!(3)]),
        ..Default::default()
    };

    let out = Executor::new(&schema)
        .execute(&mut session, "general_statistics", &FieldRequest::default())
        .await
        .unwrap();

    assert_eq!(out, json!({"total_money_earned": 30.0, "avg_user_spending": 10.0}));
    assert_eq!(
        session.executed[0].sql,
        r#"SELECT CAST(SUM(t1."price") AS DOUBLE PRECISION) FROM "purchase" t0 JOIN "item" t1 ON t1."id" = t0."item_id""#
    );
}

#[tokio::test]
async fn users_carry_row_statistics_with_zero_for_no_purchases() {
    let schema = schema();
    let mut session = Replay {
        rows: VecDeque::from(vec![vec![
            json!({"id": 1, "name": "Ana", "age": 30}),
            json!({"id": 2, "name": "Bo", "age": 41}),
        ]]),
        scalars: VecDeque::from(vec![json!(25.5), json!(2)]),
        ..Default::default()
    };
    let req = request(json!({"select": {"statistics": ["total_spent", "num_purchases"]}}));

    let out = Executor::new(&schema).execute(&mut session, "users", &req).await.unwrap();

    assert_eq!(
        out,
        json!([
            {"id": 1, "name": "Ana", "age": 30, "statistics": {"total_spent": 25.5, "num_purchases": 2}},
            {"id": 2, "name": "Bo", "age": 41, "statistics": {"total_spent": 0.0, "num_purchases": 0}}
        ])
    );
    assert_eq!(
        session.executed[1].sql,
        r#"SELECT CAST(SUM(t2."price") AS DOUBLE PRECISION) FROM "user" t0 JOIN "purchase" t1 ON t1."user_id" = t0."id" JOIN "item" t2 ON t2."id" = t1."item_id" WHERE t0."id" = $1"#
    );
    assert_eq!(session.executed[1].params, vec![PgBindValue::I64(1)]);
    assert_eq!(
        session.executed[2].sql,
        r#"SELECT COUNT(t1."id") FROM "user" t0 JOIN "purchase" t1 ON t1."user_id" = t0."id" WHERE t0."id" = $1"#
    );
    assert_eq!(session.executed[4].params, vec![PgBindValue::I64(2)]);
}

#[tokio::test]
async fn top_spenders_over_a_threshold() {
    let schema = schema();
    let mut session = Replay::default();
    let req = request(json!({
        "sum_path": "purchases.item.price",
        "having_sum_over": 100.0,
        "top_k_by_sum": 2
    }));

    let out = Executor::new(&schema).execute(&mut session, "users", &req).await.unwrap();

    assert_eq!(out, json!([]));
    assert_eq!(
        session.executed[0].sql,
        r#"SELECT t0."id", t0."name", t0."age" FROM "user" t0 JOIN "purchase" t1 ON t1."user_id" = t0."id" JOIN "item" t2 ON t2."id" = t1."item_id" GROUP BY t0."id" HAVING SUM(t2."price") > $1 ORDER BY SUM(t2."price") DESC LIMIT 2"#
    );
    assert_eq!(session.executed[0].params, vec![PgBindValue::F64(100.0)]);
}

#[tokio::test]
async fn arguments_outside_a_field_kind_are_rejected() {
    let schema = schema();
    let cases = [
        ("users", json!({"group_by": ["name"]})),
        ("users", json!({"select": {"aggregate": {"count": true}}})),
        ("users", json!({"having_sum_over": 10.0})),
        ("users", json!({"select": {"statistics": ["lifetime_value"]}})),
        ("purchases_grouped", json!({"group_by": ["item.name"], "limit": 5})),
        ("purchases_grouped", json!({"group_by": ["item.name"], "order_by": [{"id": "asc"}]})),
        ("users_grouped", json!({"group_by": ["name"], "select": {"statistics": ["total_spent"]}})),
        ("items_aggregate", json!({"offset": 1})),
        ("general_statistics", json!({"limit": 1})),
    ];
    for (field, body) in cases {
        let mut session = Replay::default();
        let err = Executor::new(&schema)
            .execute(&mut session, field, &request(body.clone()))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument(_)), "{} {}: {:?}", field, body, err);
        assert!(session.executed.is_empty(), "{} {}", field, body);
    }
}
