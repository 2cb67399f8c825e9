//! Silent refresh-retry behavior of the typed client against a mock gateway.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use imovia::client::{ApiClient, ClientError};

#[derive(Clone, Default)]
struct Hits {
    estados: Arc<AtomicUsize>,
    refreshes: Arc<AtomicUsize>,
}

/// First call answers 401, every later one succeeds.
async fn estados_after_refresh(State(hits): State<Hits>) -> impl IntoResponse {
    if hits.estados.fetch_add(1, Ordering::SeqCst) == 0 {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Token inválido" })),
        )
    } else {
        (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "data": [{ "id": 1, "est_nome": "Minas Gerais" }]
            })),
        )
    }
}

async fn estados_always_unauthorized(State(hits): State<Hits>) -> impl IntoResponse {
    hits.estados.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "message": "Token inválido" })),
    )
}

async fn refresh_ok(State(hits): State<Hits>) -> impl IntoResponse {
    hits.refreshes.fetch_add(1, Ordering::SeqCst);
    Json(json!({ "status": "ok" }))
}

async fn refresh_failure(State(hits): State<Hits>) -> impl IntoResponse {
    hits.refreshes.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "message": "Refresh failed" })),
    )
}

async fn spawn_gateway(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn retries_exactly_once_after_a_successful_refresh() {
    let hits = Hits::default();
    let router = Router::new()
        .route("/api/estados", get(estados_after_refresh))
        .route("/api/auth/refresh", post(refresh_ok))
        .with_state(hits.clone());
    let addr = spawn_gateway(router).await;

    let client = ApiClient::new(format!("http://{addr}"));
    let resp = client.get_json("/estados").await.unwrap();

    assert_eq!(resp["status"], "success");
    assert_eq!(hits.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(hits.estados.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn does_not_retry_when_the_refresh_fails() {
    let hits = Hits::default();
    let router = Router::new()
        .route("/api/estados", get(estados_always_unauthorized))
        .route("/api/auth/refresh", post(refresh_failure))
        .with_state(hits.clone());
    let addr = spawn_gateway(router).await;

    let client = ApiClient::new(format!("http://{addr}"));
    let err = client.get_json("/estados").await.unwrap_err();

    match err {
        ClientError::Http { status, message, .. } => {
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(message, "Token inválido");
        }
        other => panic!("expected http error, got {other:?}"),
    }
    assert_eq!(hits.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(hits.estados.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn a_second_rejection_after_refresh_is_surfaced_without_looping() {
    let hits = Hits::default();
    let router = Router::new()
        .route("/api/estados", get(estados_always_unauthorized))
        .route("/api/auth/refresh", post(refresh_ok))
        .with_state(hits.clone());
    let addr = spawn_gateway(router).await;

    let client = ApiClient::new(format!("http://{addr}"));
    let err = client.get_json("/estados").await.unwrap_err();

    assert!(matches!(err, ClientError::Http { status, .. } if status == StatusCode::UNAUTHORIZED));
    // one refresh, one retry, then the failure is surfaced
    assert_eq!(hits.refreshes.load(Ordering::SeqCst), 1);
    assert_eq!(hits.estados.load(Ordering::SeqCst), 2);
}
