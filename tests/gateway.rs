//! End-to-end gateway tests against a mock upstream API.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tower::ServiceExt;

use imovia::api;
use imovia::config::Config;
use imovia::AppState;

#[derive(Clone, Default)]
struct Captured {
    requests: Arc<Mutex<Vec<(HeaderMap, Value)>>>,
}

/// Records incoming admin writes. JSON bodies are kept verbatim;
/// multipart bodies become a map of text values and file byte counts.
async fn capture_admin_write(
    State(captured): State<Captured>,
    req: axum::extract::Request,
) -> impl IntoResponse {
    let headers = req.headers().clone();
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let body = if content_type.contains("multipart/form-data") {
        let mut multipart = Multipart::from_request(req, &()).await.unwrap();
        let mut parts = serde_json::Map::new();
        while let Some(field) = multipart.next_field().await.unwrap() {
            let name = field.name().unwrap_or_default().to_string();
            if field.file_name().is_some() {
                let data = field.bytes().await.unwrap();
                parts.insert(name, json!(data.len()));
            } else {
                parts.insert(name, json!(field.text().await.unwrap()));
            }
        }
        Value::Object(parts)
    } else {
        let bytes = to_bytes(req.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    captured.requests.lock().push((headers, body));
    Json(json!({ "status": "success" }))
}

async fn upstream_list_with_cookies() -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    headers.append(SET_COOKIE, "first=1; Path=/".parse().unwrap());
    headers.append(SET_COOKIE, "second=2; Path=/; HttpOnly".parse().unwrap());
    (headers, Json(json!({ "status": "success", "data": [] })))
}

async fn upstream_login() -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        "ci_session=sess-xyz; Path=/; HttpOnly".parse().unwrap(),
    );
    (
        headers,
        Json(json!({
            "status": "success",
            "token": jwt(json!({"id": 7, "exp": far_future()})),
            "refreshToken": "refresh-abc",
            "user": { "id": 7, "nome": "Ana", "email": "ana@example.com" }
        })),
    )
}

async fn upstream_refresh_failure() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({})))
}

/// Spawns the mock upstream API on an ephemeral port.
async fn spawn_upstream(captured: Captured) -> SocketAddr {
    let router = Router::new()
        .route("/login", post(upstream_login))
        .route("/refresh", post(upstream_refresh_failure))
        .route("/auth/refresh", post(upstream_refresh_failure))
        .route("/admin/cadastrar/imovel", post(capture_admin_write))
        .route("/admin/listar/imoveis", get(upstream_list_with_cookies))
        .layer(DefaultBodyLimit::max(16 * 1024 * 1024))
        .with_state(captured);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn gateway_app(upstream: SocketAddr) -> Router {
    let mut config = Config::default();
    config.upstream.api_base_url = format!("http://{upstream}");
    let state = Arc::new(AppState::new(config).unwrap());
    Router::new()
        .merge(api::create_router(state))
        .layer(axum::middleware::from_fn(api::guard::admin_page_guard))
        .layer(axum::middleware::from_fn(api::guard::security_headers))
}

fn far_future() -> i64 {
    chrono::Utc::now().timestamp() + 3600
}

fn jwt(payload: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
    format!("{header}.{body}.sig")
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn set_cookies(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn anonymous_admin_page_redirects_to_login() {
    let upstream = spawn_upstream(Captured::default()).await;
    let app = gateway_app(upstream);

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/admin/dashboard")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(resp.status().is_redirection());
    assert_eq!(
        resp.headers().get(LOCATION).unwrap(),
        "/login?next=%2Fadmin%2Fdashboard"
    );
}

#[tokio::test]
async fn csrf_issues_readable_token() {
    let upstream = spawn_upstream(Captured::default()).await;
    let app = gateway_app(upstream);

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/auth/csrf")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("cache-control").unwrap(), "no-store");
    let cookies = set_cookies(resp.headers());
    let csrf = cookies
        .iter()
        .find(|c| c.starts_with("csrf_token="))
        .expect("csrf cookie");
    assert!(!csrf.contains("HttpOnly"), "csrf cookie must be readable");

    let body = body_json(resp).await;
    let token = body["token"].as_str().unwrap();
    assert_eq!(token.len(), 64);
    assert!(csrf.contains(token));
}

#[tokio::test]
async fn login_with_mismatched_csrf_is_rejected() {
    let upstream = spawn_upstream(Captured::default()).await;
    let app = gateway_app(upstream);

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header(CONTENT_TYPE, "application/json")
                .header(COOKIE, "csrf_token=aaaaaaaaaaaaaaaa")
                .header("x-csrf-token", "bbbbbbbbbbbbbbbb")
                .body(Body::from(
                    json!({"email": "ana@example.com", "senha": "s3cret"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert!(set_cookies(resp.headers()).is_empty());
}

#[tokio::test]
async fn login_sets_session_cookies_and_returns_user() {
    let upstream = spawn_upstream(Captured::default()).await;
    let app = gateway_app(upstream);

    let csrf = "c".repeat(32);
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header(CONTENT_TYPE, "application/json")
                .header(COOKIE, format!("csrf_token={csrf}"))
                .header("x-csrf-token", csrf.clone())
                .body(Body::from(
                    json!({"email": "ana@example.com", "senha": "s3cret"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let cookies = set_cookies(resp.headers());

    let access = cookies
        .iter()
        .find(|c| c.starts_with("auth_token="))
        .expect("access cookie");
    assert!(access.contains("HttpOnly"));

    let refresh = cookies
        .iter()
        .find(|c| c.starts_with("refresh_token="))
        .expect("refresh cookie");
    assert!(refresh.contains("Path=/api/auth/refresh"));

    let ci = cookies
        .iter()
        .find(|c| c.starts_with("ci_session="))
        .expect("ci_session passthrough");
    assert!(ci.contains("sess-xyz"));

    let ui = cookies
        .iter()
        .find(|c| c.starts_with("ui_user="))
        .expect("ui_user cookie");
    assert!(!ui.contains("HttpOnly"));
    let encoded = ui
        .trim_start_matches("ui_user=")
        .split(';')
        .next()
        .unwrap();
    let decoded: Value =
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(encoded).unwrap()).unwrap();
    assert_eq!(decoded["id"], 7);
    assert_eq!(decoded["nome"], "Ana");

    let body = body_json(resp).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["user"]["id"], 7);
}

#[tokio::test]
async fn proxy_stamps_audit_fields_on_admin_writes() {
    let captured = Captured::default();
    let upstream = spawn_upstream(captured.clone()).await;
    let app = gateway_app(upstream);

    let token = jwt(json!({"id": 7, "exp": far_future()}));
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/admin/cadastrar/imovel")
                .header(CONTENT_TYPE, "application/json")
                .header(COOKIE, format!("auth_token={token}"))
                .body(Body::from(json!({"imo_nome": "Casa Azul"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);

    let requests = captured.requests.lock();
    assert_eq!(requests.len(), 1);
    let (headers, body) = &requests[0];
    assert_eq!(body["imo_nome"], "Casa Azul");
    assert_eq!(body["usu_created"], 7);
    assert_eq!(body["usu_updated"], 7);
    assert_eq!(headers.get("x-user-id").unwrap(), "7");
    assert_eq!(
        headers.get(AUTHORIZATION).unwrap(),
        &format!("Bearer {token}")
    );
    assert_eq!(headers.get("accept-encoding").unwrap(), "identity");
}

#[tokio::test]
async fn proxy_respects_caller_provided_audit_fields() {
    let captured = Captured::default();
    let upstream = spawn_upstream(captured.clone()).await;
    let app = gateway_app(upstream);

    let token = jwt(json!({"id": 7, "exp": far_future()}));
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri("/api/admin/cadastrar/imovel")
            .header(CONTENT_TYPE, "application/json")
            .header(COOKIE, format!("auth_token={token}"))
            .body(Body::from(
                json!({"imo_nome": "Casa", "usu_created": 99}).to_string(),
            ))
            .unwrap(),
    )
    .await
    .unwrap();

    let requests = captured.requests.lock();
    let (_, body) = &requests[0];
    assert_eq!(body["usu_created"], 99, "existing value must be kept");
    assert_eq!(body["usu_updated"], 7, "missing value is stamped");
}

#[tokio::test]
async fn proxy_carries_multipart_uploads_past_the_default_body_cap() {
    let captured = Captured::default();
    let upstream = spawn_upstream(captured.clone()).await;
    let app = gateway_app(upstream);

    // a 3 MB photo, well over axum's 2 MB extractor default but under
    // the form's own upload cap
    let photo = vec![0u8; 3 * 1024 * 1024];
    let boundary = "gatewayboundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; \
             name=\"images[0]\"; filename=\"foto.jpg\"\r\n\
             Content-Type: image/jpeg\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(&photo);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let token = jwt(json!({"id": 7, "exp": far_future()}));
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/admin/cadastrar/imovel")
                .header(
                    CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .header(COOKIE, format!("auth_token={token}"))
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);

    let requests = captured.requests.lock();
    assert_eq!(requests.len(), 1);
    let (_, body) = &requests[0];
    assert_eq!(body["images[0]"], 3 * 1024 * 1024);
    // audit stamping appends missing text parts
    assert_eq!(body["usu_created"], "7");
    assert_eq!(body["usu_updated"], "7");
}

#[tokio::test]
async fn proxy_passes_repeated_set_cookie_headers_through() {
    let upstream = spawn_upstream(Captured::default()).await;
    let app = gateway_app(upstream);

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/admin/listar/imoveis")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let cookies = set_cookies(resp.headers());
    assert!(cookies.iter().any(|c| c.starts_with("first=1")));
    assert!(cookies.iter().any(|c| c.starts_with("second=2")));
}

#[tokio::test]
async fn me_reports_user_and_expiry_independently() {
    let upstream = spawn_upstream(Captured::default()).await;
    let app = gateway_app(upstream);

    // readable user cookie present, access token expired
    let ui = URL_SAFE_NO_PAD.encode(
        json!({"id": 3, "nome": "Bia", "email": "b@c.d", "foto": null}).to_string(),
    );
    let stale = jwt(json!({"id": 3, "exp": chrono::Utc::now().timestamp() - 10}));
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/auth/me")
                .header(COOKIE, format!("auth_token={stale}; ui_user={ui}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let body = body_json(resp).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["authenticated"], false);
    assert_eq!(body["user"]["id"], 3);
    assert_eq!(body["user"]["nome"], "Bia");
}

#[tokio::test]
async fn refresh_without_cookie_is_unauthorized() {
    let upstream = spawn_upstream(Captured::default()).await;
    let app = gateway_app(upstream);

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/refresh")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(resp).await;
    assert_eq!(body["message"], "No refresh token");
}

#[tokio::test]
async fn failed_refresh_clears_session_cookies() {
    let upstream = spawn_upstream(Captured::default()).await;
    let app = gateway_app(upstream);

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/refresh")
                .header(COOKIE, "refresh_token=stale")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body_cookies = set_cookies(resp.headers());
    assert!(body_cookies
        .iter()
        .any(|c| c.starts_with("auth_token=") && c.contains("Max-Age=0")));
    assert!(body_cookies
        .iter()
        .any(|c| c.starts_with("refresh_token=") && c.contains("Max-Age=0")));
}

#[tokio::test]
async fn logout_expires_all_session_cookies() {
    let upstream = spawn_upstream(Captured::default()).await;
    let app = gateway_app(upstream);

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let cookies = set_cookies(resp.headers());
    for name in ["auth_token=", "refresh_token=", "ui_user=", "ci_session="] {
        assert!(
            cookies
                .iter()
                .any(|c| c.starts_with(name) && c.contains("Max-Age=0")),
            "{name} must be expired"
        );
    }
}

#[tokio::test]
async fn invalid_cep_is_rejected_before_the_provider() {
    let upstream = spawn_upstream(Captured::default()).await;
    let app = gateway_app(upstream);

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/cep?cep=123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn page_responses_carry_security_headers_api_does_not() {
    let upstream = spawn_upstream(Captured::default()).await;
    let app = gateway_app(upstream);

    let page = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(page.headers().contains_key("content-security-policy"));
    assert_eq!(page.headers().get("x-frame-options").unwrap(), "DENY");

    let api = app
        .oneshot(
            Request::builder()
                .uri("/api/auth/csrf")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(!api.headers().contains_key("content-security-policy"));
}
