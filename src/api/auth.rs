//! Cookie-based auth gateway routes.
//!
//! The gateway terminates no credentials itself: login and refresh are
//! brokered to the upstream API and the resulting tokens live in
//! httpOnly cookies. A readable `ui_user` cookie carries the display
//! user, and a double-submit `csrf_token` cookie protects login.

use std::sync::Arc;

use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, HOST, ORIGIN, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use rand::RngCore;
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use crate::api::error::ApiError;
use crate::models::SafeUser;
use crate::session::tokens::{
    decode_ui_user, encode_ui_user, parse_jwt, ACCESS_COOKIE, ACCESS_TOKEN_MAX_AGE,
    CI_SESSION_COOKIE, CI_SESSION_MAX_AGE, CSRF_COOKIE, CSRF_TOKEN_MAX_AGE, REFRESH_COOKIE,
    REFRESH_COOKIE_PATH, REFRESH_TOKEN_MAX_AGE, UI_USER_COOKIE, UI_USER_MAX_AGE,
};
use crate::session::is_access_valid;
use crate::AppState;

const LOGIN_BODY_LIMIT: usize = 64 * 1024;

fn base_cookie(name: &'static str, value: String, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}

fn access_cookie(value: String) -> Cookie<'static> {
    base_cookie(ACCESS_COOKIE, value, ACCESS_TOKEN_MAX_AGE)
}

fn refresh_cookie(value: String) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, value))
        .path(REFRESH_COOKIE_PATH)
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(REFRESH_TOKEN_MAX_AGE))
        .build()
}

fn ui_user_cookie(value: String) -> Cookie<'static> {
    Cookie::build((UI_USER_COOKIE, value))
        .path("/")
        .http_only(false)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(UI_USER_MAX_AGE))
        .build()
}

fn expired(name: &'static str, path: &'static str, http_only: bool) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path(path)
        .http_only(http_only)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .build()
}

/// Rejects cross-origin browser requests. Requests without an Origin
/// header (same-origin fetches, curl) pass.
fn same_origin(headers: &HeaderMap) -> bool {
    let Some(origin) = headers.get(ORIGIN).and_then(|v| v.to_str().ok()) else {
        return true;
    };
    let Some(host) = headers.get(HOST).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    origin
        .split_once("://")
        .map(|(_, rest)| rest == host)
        .unwrap_or(false)
}

fn tokens_match(a: &str, b: &str) -> bool {
    !a.is_empty() && a.len() == b.len() && a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Reads one cookie value out of an upstream Set-Cookie header set.
fn cookie_from_upstream(headers: &reqwest::header::HeaderMap, name: &str) -> Option<String> {
    headers.get_all(SET_COOKIE).iter().find_map(|raw| {
        let raw = raw.to_str().ok()?;
        let pair = raw.split(';').next()?;
        let (key, value) = pair.split_once('=')?;
        (key.trim() == name).then(|| value.trim().to_string())
    })
}

fn string_field(value: &serde_json::Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(|v| v.as_str()))
        .map(str::to_string)
        .unwrap_or_default()
}

/// GET /api/auth/csrf
///
/// Issues (or re-issues) the readable double-submit token. An existing
/// token of plausible length is reused so parallel tabs do not race.
pub async fn csrf(jar: CookieJar) -> Response {
    let token = match jar.get(CSRF_COOKIE) {
        Some(c) if c.value().len() >= 32 => c.value().to_string(),
        _ => {
            let mut bytes = [0u8; 32];
            rand::rng().fill_bytes(&mut bytes);
            hex::encode(bytes)
        }
    };
    let cookie = Cookie::build((CSRF_COOKIE, token.clone()))
        .path("/")
        .http_only(false)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(CSRF_TOKEN_MAX_AGE))
        .build();
    let mut response = (jar.add(cookie), Json(json!({ "token": token }))).into_response();
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

/// POST /api/auth/login
///
/// Accepts JSON or a urlencoded form. The CSRF token must arrive both
/// as the cookie and as a header/body field, compared in constant time.
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    req: Request,
) -> Result<Response, ApiError> {
    let headers = req.headers().clone();
    if !same_origin(&headers) {
        return Ok(StatusCode::FORBIDDEN.into_response());
    }

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let bytes = to_bytes(req.into_body(), LOGIN_BODY_LIMIT)
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let body: serde_json::Value = if content_type.contains("application/json") {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| json!({}))
    } else {
        serde_urlencoded::from_bytes::<Vec<(String, String)>>(&bytes)
            .map(|pairs| serde_json::Value::Object(pairs.into_iter().map(|(k, v)| (k, v.into())).collect()))
            .unwrap_or_else(|_| json!({}))
    };

    let cookie_token = jar
        .get(CSRF_COOKIE)
        .map(|c| c.value().to_string())
        .unwrap_or_default();
    let submitted = headers
        .get("x-csrf-token")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| string_field(&body, &["csrfToken"]));
    if !tokens_match(&cookie_token, &submitted) {
        warn!("Login rejected: CSRF token mismatch");
        return Ok(StatusCode::FORBIDDEN.into_response());
    }

    let email = string_field(&body, &["email"]);
    let senha = string_field(&body, &["senha", "password"]);

    let base = state.config.upstream.api_base();
    let upstream = state
        .upstream
        .post(format!("{base}/login"))
        .json(&json!({ "email": email, "senha": senha }))
        .send()
        .await?;

    let status = upstream.status();
    let upstream_headers = upstream.headers().clone();
    let data: serde_json::Value = upstream.json().await.unwrap_or_else(|_| json!({}));

    if !status.is_success() {
        debug!(%status, "Upstream rejected login");
        return Ok((
            StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::UNAUTHORIZED),
            Json(data),
        )
            .into_response());
    }

    let access = {
        let from_body = string_field(&data, &["token", "accessToken"]);
        if from_body.is_empty() {
            cookie_from_upstream(&upstream_headers, ACCESS_COOKIE).unwrap_or_default()
        } else {
            from_body
        }
    };
    let refresh = {
        let from_body = string_field(&data, &["refreshToken", "refresh_token"]);
        if from_body.is_empty() {
            cookie_from_upstream(&upstream_headers, REFRESH_COOKIE).unwrap_or_default()
        } else {
            from_body
        }
    };

    if access.is_empty() {
        return Ok((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Token inválido" })),
        )
            .into_response());
    }

    let user = SafeUser::pick(&data).unwrap_or(SafeUser {
        id: 0,
        nome: String::new(),
        email: String::new(),
        foto: None,
    });

    let mut jar = jar.add(access_cookie(access));
    if !refresh.is_empty() {
        jar = jar.add(refresh_cookie(refresh));
    }
    jar = jar.add(ui_user_cookie(encode_ui_user(&user)));
    if let Some(ci) = cookie_from_upstream(&upstream_headers, CI_SESSION_COOKIE) {
        jar = jar.add(base_cookie(CI_SESSION_COOKIE, ci, CI_SESSION_MAX_AGE));
    }

    info!(user = user.id, "Login succeeded");
    Ok((jar, Json(json!({ "status": "success", "user": user }))).into_response())
}

/// POST /api/auth/logout
pub async fn logout(jar: CookieJar) -> Response {
    let jar = jar
        .add(expired(ACCESS_COOKIE, "/", true))
        .add(expired(REFRESH_COOKIE, REFRESH_COOKIE_PATH, true))
        .add(expired(UI_USER_COOKIE, "/", false))
        .add(expired(CI_SESSION_COOKIE, "/", true));
    (jar, Json(json!({ "status": "success" }))).into_response()
}

/// GET /api/auth/me
///
/// `authenticated` depends only on the access token's expiry; `user` is
/// resolved independently (cookie, then JWT claims, then upstream) so a
/// stale session can still render who was signed in.
pub async fn me(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let token = jar.get(ACCESS_COOKIE).map(|c| c.value().to_string());
    let raw_ui = jar.get(UI_USER_COOKIE).map(|c| c.value().to_string());

    let mut user = raw_ui.as_deref().and_then(decode_ui_user);
    if user.is_none() {
        user = token
            .as_deref()
            .and_then(parse_jwt)
            .and_then(|claims| SafeUser::pick(&claims));
    }
    if user.is_none() {
        user = fetch_upstream_user(&state, token.as_deref()).await;
    }

    let authenticated = is_access_valid(token.as_deref());
    Json(json!({
        "status": "success",
        "authenticated": authenticated,
        "user": user,
    }))
    .into_response()
}

async fn fetch_upstream_user(state: &AppState, token: Option<&str>) -> Option<SafeUser> {
    let token = token?;
    let base = state.config.upstream.api_base();
    let resp = state
        .upstream
        .get(format!("{base}/auth/me"))
        .header("accept", "application/json")
        .header("accept-encoding", "identity")
        .bearer_auth(token)
        .send()
        .await
        .ok()?;
    if !resp.status().is_success() {
        return None;
    }
    let body: serde_json::Value = resp.json().await.ok()?;
    SafeUser::pick(&body)
}

/// POST /api/auth/refresh
///
/// Tries the upstream's two known refresh routes in order. A total
/// failure clears both token cookies so the client stops retrying.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if !same_origin(&headers) {
        return Ok(StatusCode::FORBIDDEN.into_response());
    }

    let Some(refresh_token) = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string()) else {
        return Ok((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "No refresh token" })),
        )
            .into_response());
    };

    let base = state.config.upstream.api_base().to_string();
    let mut access = String::new();
    let mut new_refresh = String::new();

    for endpoint in [format!("{base}/refresh"), format!("{base}/auth/refresh")] {
        let resp = state
            .upstream
            .post(&endpoint)
            .bearer_auth(&refresh_token)
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await;
        let Ok(resp) = resp else {
            continue;
        };
        if !resp.status().is_success() {
            continue;
        }
        let body: serde_json::Value = resp.json().await.unwrap_or_else(|_| json!({}));
        access = string_field(&body, &["token", "accessToken"]);
        new_refresh = string_field(&body, &["refreshToken", "refresh_token"]);
        if !access.is_empty() {
            break;
        }
    }

    if access.is_empty() {
        warn!("Session refresh failed on all upstream endpoints");
        let jar = jar
            .add(expired(ACCESS_COOKIE, "/", true))
            .add(expired(REFRESH_COOKIE, REFRESH_COOKIE_PATH, true));
        return Ok((
            StatusCode::UNAUTHORIZED,
            jar,
            Json(json!({ "message": "Refresh failed" })),
        )
            .into_response());
    }

    let mut jar = jar.add(access_cookie(access));
    if !new_refresh.is_empty() {
        jar = jar.add(refresh_cookie(new_refresh));
    }
    debug!("Access token refreshed");
    Ok((jar, Json(json!({ "status": "ok" }))).into_response())
}
