mod common;

use axum::http::StatusCode;
use common::{app, app_with, send, user};
use crud_engine::config::{FieldKind, FieldSchema, FieldSpec};
use crud_engine::testing::MemoryExecutor;
use crud_engine::{deploy, ResourceRegistration};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn habit_lifecycle() {
    let (_db, app) = app();
    let u = user();
    let v = user();

    let (status, created) = send(&app, "POST", "/habit", Some(&u), Some(json!({ "name": "Run", "goal": "5" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["user_id"], json!(u));
    assert_eq!(created["name"], json!("Run"));
    assert_eq!(created["goal"], json!(5.0));
    assert_eq!(created["type"], json!(0));
    let id = created["id"].as_str().unwrap().to_string();
    let item = format!("/habit/{}", id);

    let (status, fetched) = send(&app, "GET", &item, Some(&u), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, body) = send(&app, "GET", &item, Some(&v), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "success": false, "message": "Not found" }));

    let (status, updated) = send(&app, "PUT", &item, Some(&u), Some(json!({ "goal": "10" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], json!("Run"));
    assert_eq!(updated["goal"], json!(10.0));
    assert_eq!(updated["type"], json!(0));

    let (status, body) = send(&app, "DELETE", &item, Some(&u), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, json!(null));

    let (status, _) = send(&app, "GET", &item, Some(&u), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn listing_only_returns_own_records() {
    let (_db, app) = app();
    let (u, v) = (user(), user());
    for name in ["a", "b"] {
        send(&app, "POST", "/tag", Some(&u), Some(json!({ "name": name }))).await;
    }
    send(&app, "POST", "/tag", Some(&v), Some(json!({ "name": "c" }))).await;

    let (status, rows) = send(&app, "GET", "/tag", Some(&u), None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = rows.as_array().unwrap().iter().map(|r| r["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["a", "b"]);

    let (status, rows) = send(&app, "GET", "/tag", Some(&user()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rows, json!([]));
}

#[tokio::test]
async fn foreign_records_cannot_be_changed() {
    let (db, app) = app();
    let (u, v) = (user(), user());
    let (_, created) = send(&app, "POST", "/habit", Some(&u), Some(json!({ "name": "Run", "goal": "5" }))).await;
    let item = format!("/habit/{}", created["id"].as_str().unwrap());

    let (status, _) = send(&app, "PUT", &item, Some(&v), Some(json!({ "name": "Mine" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "DELETE", &item, Some(&v), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let rows = db.rows("f0_habits");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], json!("Run"));
}

#[tokio::test]
async fn client_cannot_choose_owner_or_id() {
    let (_db, app) = app();
    let u = user();
    let forged_id = uuid::Uuid::new_v4().to_string();
    let body = json!({ "name": "Run", "goal": "1", "user_id": user(), "id": forged_id });
    let (status, created) = send(&app, "POST", "/habit", Some(&u), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["user_id"], json!(u));
    assert_ne!(created["id"], json!(forged_id));
}

#[tokio::test]
async fn malformed_ids_and_missing_rows_are_not_found() {
    let (db, app) = app();
    let u = user();
    let (status, _) = send(&app, "GET", "/habit/not-a-uuid", Some(&u), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(db.statements().is_empty());

    let missing = format!("/habit/{}", uuid::Uuid::new_v4());
    let (status, _) = send(&app, "PUT", &missing, Some(&u), Some(json!({ "name": "x" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "DELETE", &missing, Some(&u), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn statements_bind_values_in_schema_order() {
    let (db, app) = app();
    let u = user();
    send(&app, "POST", "/habit", Some(&u), Some(json!({ "goal": "5", "name": "Run" }))).await;
    let insert = db.statements().pop().unwrap();
    assert_eq!(
        insert.sql,
        "INSERT INTO \"f0_habits\" (\"user_id\", \"name\", \"goal\", \"type\", \"objective\") \
         VALUES ($1::uuid, $2::text, $3::float8, $4::int8, $5::uuid) \
         RETURNING \"id\", \"user_id\", \"name\", \"created_at\", \"goal\", \"type\", \"objective\""
    );
    assert_eq!(insert.params, vec![json!(u), json!("Run"), json!(5.0), json!(0), json!(null)]);
}

#[tokio::test]
async fn storage_failures_are_masked() {
    let (db, app) = app();
    db.fail_with("password authentication failed for user postgres");
    let (status, body) = send(&app, "GET", "/habit", Some(&user()), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "success": false, "message": "Internal Server Error" }));
}

#[tokio::test]
async fn task_fields_are_canonicalized() {
    let (_db, app) = app();
    let u = user();
    let body = json!({
        "name": "Report",
        "date": "2024-03-01",
        "deadline": 1_709_251_200_000_i64,
        "progress": "0",
        "goal": "3"
    });
    let (status, created) = send(&app, "POST", "/task", Some(&u), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["date"], json!("2024-03-01T00:00:00.000Z"));
    assert_eq!(created["deadline"], json!("2024-03-01T00:00:00.000Z"));
    assert_eq!(created["all_day"], json!(true));
    assert_eq!(created["completed"], json!(false));
    assert_eq!(created["progress"], json!(0.0));
}

#[tokio::test]
async fn untagged_owner_column_is_not_mounted() {
    let db = Arc::new(MemoryExecutor::new());
    let regs = vec![
        ResourceRegistration::new(
            "f0_notes",
            "/note",
            FieldSchema::new(vec![
                FieldSpec::new("user_id", FieldKind::Identifier),
                FieldSpec::new("text", FieldKind::String),
            ]),
        ),
        ResourceRegistration::new(
            "f0_tags",
            "/tag",
            FieldSchema::new(vec![FieldSpec::new("name", FieldKind::String)]),
        ),
    ];
    let deployment = deploy(&regs, db.clone(), &[]);
    assert_eq!(deployment.mounted, vec!["/tag".to_string()]);
    assert_eq!(deployment.failed[0].0, "/note");

    let app = app_with(&regs, db.clone());
    let (u, v) = (user(), user());
    let (status, _) = send(&app, "POST", "/note", Some(&u), Some(json!({ "user_id": v, "text": "hi" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(db.rows("f0_notes").is_empty());
}

#[tokio::test]
async fn day_of_week_items_are_bounded() {
    let (db, app) = app();
    let u = user();
    let body = |days: serde_json::Value| {
        json!({
            "habit_id": user(),
            "schedule_id": user(),
            "repeat_type": "weekly",
            "repeat_interval": 1,
            "day_of_week": days,
            "hour_of_day": "07:30"
        })
    };
    let (status, _) = send(&app, "POST", "/habit-time", Some(&u), Some(body(json!([7])))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&app, "POST", "/habit-time", Some(&u), Some(body(json!([9, -3])))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(db.rows("f0_habit_times").is_empty());

    let (status, created) = send(&app, "POST", "/habit-time", Some(&u), Some(body(json!([0, 6])))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["day_of_week"], json!([0, 6]));
    assert_eq!(created["user_id"], json!(u));
}
