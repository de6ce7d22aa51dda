//! HTTP surface tests driving the router with `tower::ServiceExt::oneshot`.

mod common;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::setup;
use serde_json::{Value, json};
use table_bridge::transport::router;
use tower::ServiceExt;

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            builder = builder.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_full_crud_cycle() {
    let fx = setup().await;
    let app = router(fx.dispatcher.clone(), "/api");

    let (status, body) = send(&app, "GET", "/api/main/items/test", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "Database main connection successful"}));

    let (status, body) = send(
        &app,
        "POST",
        "/api/main/items",
        Some(json!({"name": "a", "value": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Record added to items in main");

    let (status, body) = send(&app, "GET", "/api/main/items?page=1&limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["name"], "a");
    assert_eq!(body["data"][0]["value"], 1);
    assert_eq!(
        body["pagination"],
        json!({
            "total_records": 1,
            "limit": 5,
            "skip": 0,
            "total_pages": 1,
            "current_page": 1
        })
    );

    let (status, body) = send(&app, "PUT", "/api/main/items/1", Some(json!({"name": "b"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Record 1 updated in items in main");

    let (status, body) = send(&app, "PATCH", "/api/main/items/1", Some(json!({"value": 9}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Record 1 patched in items");

    let (status, body) = send(
        &app,
        "DELETE",
        "/api/main/items/1",
        Some(json!({"deleted_by_guid": 42})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Record 1 soft deleted from items");
    assert_eq!(body["deleted_by"], 42);
    assert!(body["deleted_at"].as_i64().unwrap() > 0);

    let (status, body) = send(&app, "DELETE", "/api/main/items/1/hard", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Record 1 deleted from items in main");

    let (status, body) = send(&app, "DELETE", "/api/main/items/1/hard", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Record 1 not found in items");
}

#[tokio::test]
async fn test_error_statuses() {
    let fx = setup().await;
    let app = router(fx.dispatcher.clone(), "/api");

    let (status, body) = send(&app, "GET", "/api/ghost/items", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Database ghost not found");

    let (status, body) = send(&app, "GET", "/api/main/nope", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid table name: nope");

    let (status, body) = send(
        &app,
        "POST",
        "/api/main/items",
        Some(json!({"name": "a", "colour": "red"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("colour"));

    let (status, _) = send(&app, "PUT", "/api/main/items/999999", Some(json!({"name": "x"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "PATCH", "/api/main/items/999999", Some(json!({"name": "x"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "DELETE",
        "/api/main/items/999999",
        Some(json!({"deleted_by_guid": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_requests_are_bad_requests() {
    let fx = setup().await;
    let app = router(fx.dispatcher.clone(), "/api");

    let (status, body) = send(&app, "GET", "/api/main/items?limit=ten", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("limit"));

    let (status, body) = send(&app, "DELETE", "/api/main/items/abc/hard", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());

    let (status, _) = send(&app, "POST", "/api/main/items", Some(json!([1, 2]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/api/main/items", Some(json!({"name": {"x": 1}}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/api/main/items", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "DELETE", "/api/main/items/1", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // no content type
    let (status, _) = send(&app, "POST", "/api/main/items", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_root_base_path() {
    let fx = setup().await;
    let app = router(fx.dispatcher.clone(), "/");

    let (status, body) = send(&app, "GET", "/main/items", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));

    let (status, _) = send(&app, "GET", "/api/main/items/test", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
