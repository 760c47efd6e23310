//! Black-box tests of the HTTP surface over in-memory storage.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use mockva_ledger::InMemoryStore;
use mockva_server::{router, state_over, ServerConfig, StorageBackend};

fn app() -> Router {
    let config = ServerConfig {
        storage_backend: StorageBackend::Memory,
        ..Default::default()
    };
    router(state_over(Arc::new(InMemoryStore::new()), &config))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(body) => Body::from(body.to_string()),
            None => Body::empty(),
        })
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn register(app: &Router, id: &str, balance: &str, allow_negative: bool) {
    let (status, body) = send(
        app,
        "POST",
        "/accounts",
        Some(json!({
            "id": id,
            "name": format!("Holder {id}"),
            "address": "Jl. Merdeka 17",
            "birthDate": "1991-08-17",
            "gender": true,
            "allowNegativeBalance": allow_negative,
            "initialBalance": balance,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn test_register_and_find_account() {
    let app = app();
    register(&app, "1001", "100000", false).await;

    let (status, body) = send(&app, "GET", "/accounts/1001", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accountId"], "1001");
    assert_eq!(body["name"], "Holder 1001");
    assert_eq!(body["birthDate"], "1991-08-17");
    assert_eq!(body["balance"], "100000.00");
    assert_eq!(body["allowNegativeBalance"], false);
}

#[tokio::test]
async fn test_register_duplicate_is_rejected() {
    let app = app();
    register(&app, "1001", "0", false).await;

    let (status, body) = send(
        &app,
        "POST",
        "/accounts",
        Some(json!({"id": "1001", "name": "Again", "birthDate": "1991-08-17"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "68");
}

#[tokio::test]
async fn test_find_unknown_account() {
    let (status, body) = send(&app(), "GET", "/accounts/404404", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "76");
    assert_eq!(body["errorMessage"], "Account with ID 404404 not found");
}

#[tokio::test]
async fn test_edit_account() {
    let app = app();
    register(&app, "1001", "10", false).await;

    let (status, body) = send(
        &app,
        "PUT",
        "/accounts/1001",
        Some(json!({"name": "Renamed", "birthDate": "", "allowNegativeBalance": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["name"], "Renamed");
    assert_eq!(body["birthDate"], "1991-08-17");

    let (_, details) = send(&app, "GET", "/accounts/1001", None).await;
    assert_eq!(details["allowNegativeBalance"], true);
}

#[tokio::test]
async fn test_transfer_flow() {
    let app = app();
    register(&app, "A", "100000", false).await;
    register(&app, "B", "0", false).await;

    let (status, body) = send(
        &app,
        "POST",
        "/accountTransactions/transfer",
        Some(json!({"accountSrcId": "A", "accountDstId": "B", "amount": 5000})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["accountSrcId"], "A");
    assert_eq!(body["accountDstId"], "B");
    assert_eq!(body["amount"], "5000.00");
    assert!(body["id"].is_string());

    let (_, a) = send(&app, "GET", "/accounts/A", None).await;
    let (_, b) = send(&app, "GET", "/accounts/B", None).await;
    assert_eq!(a["balance"], "95000.00");
    assert_eq!(b["balance"], "5000.00");

    let (status, body) = send(
        &app,
        "POST",
        "/accountTransactions/transfer",
        Some(json!({"accountSrcId": "A", "accountDstId": "B", "amount": "150000"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorCode"], "51");

    let (status, metrics) = send(&app, "GET", "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics["attempted"], 2);
    assert_eq!(metrics["succeeded"], 1);
    assert_eq!(metrics["rejected"], 1);
}

#[tokio::test]
async fn test_transfer_validation_errors() {
    let app = app();

    let cases = [
        (json!({"accountDstId": "B", "amount": 1}), "Invalid request: source account id required"),
        (json!({"accountSrcId": "A", "amount": 1}), "Invalid request: destination account id required"),
        (json!({"accountSrcId": "A", "accountDstId": "B", "amount": 0}), "Invalid request: amount must be positive"),
        (json!({"accountSrcId": "A", "accountDstId": "A", "amount": 1}), "Invalid request: cannot transfer to the same account"),
    ];

    for (payload, message) in cases {
        let (status, body) = send(&app, "POST", "/accountTransactions/transfer", Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errorCode"], "30");
        assert_eq!(body["errorMessage"], message);
    }
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let request = Request::builder()
        .method("POST")
        .uri("/accountTransactions/transfer")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["errorCode"], "30");
}

#[tokio::test]
async fn test_version() {
    let (status, body) = send(&app(), "GET", "/version", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
