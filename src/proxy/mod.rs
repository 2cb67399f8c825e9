//! Catch-all reverse proxy for `/api/*`.
//!
//! Forwards every request to the configured upstream API, carrying the
//! caller's cookies and bearer token, and stamps mutation requests to
//! the admin write routes with the acting user id (`usu_created` /
//! `usu_updated`) when the caller did not provide one.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::header::{
    ACCEPT, ACCEPT_ENCODING, AUTHORIZATION, CONNECTION, CONTENT_ENCODING, CONTENT_LENGTH,
    CONTENT_TYPE, HOST, TRANSFER_ENCODING,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::Response;
use axum_extra::extract::CookieJar;
use tracing::{debug, warn};

use crate::api::error::ApiError;
use crate::session::tokens::{ACCESS_COOKIE, UI_USER_COOKIE};
use crate::session::resolve_user_id;
use crate::AppState;

const AUDIT_CREATED: &str = "usu_created";
const AUDIT_UPDATED: &str = "usu_updated";

/// Cap for proxied request bodies. Also raises the multipart extractor's
/// default limit on the catch-all route, which is far below the upload
/// sizes the admin property form produces.
pub const BODY_LIMIT: usize = 64 * 1024 * 1024;

/// Mutations to the admin write routes get audit stamping.
fn needs_audit(path: &str) -> bool {
    path.contains("/admin/cadastrar") || path.contains("/admin/editar")
}

/// Collapses the wildcard segments the way the upstream expects:
/// stray slashes trimmed per segment, empty segments dropped.
fn join_segments(raw: &str) -> String {
    raw.split('/')
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

enum OutboundBody {
    None,
    Json(serde_json::Value),
    Urlencoded(Vec<(String, String)>),
    Multipart(reqwest::multipart::Form),
    Raw(bytes::Bytes),
}

pub async fn forward(
    State(state): State<Arc<AppState>>,
    Path(raw_path): Path<String>,
    jar: CookieJar,
    req: Request,
) -> Result<Response, ApiError> {
    let base = state.config.upstream.api_base().to_string();
    if base.is_empty() {
        return Err(ApiError::internal("Upstream API base URL not configured"));
    }

    let path = join_segments(&raw_path);
    let query = req.uri().query().map(str::to_string);
    let method = req.method().clone();
    let headers_in = req.headers().clone();

    let token = jar.get(ACCESS_COOKIE).map(|c| c.value().to_string());
    let ui_user = jar.get(UI_USER_COOKIE).map(|c| c.value().to_string());

    let audit = needs_audit(&format!("/{path}"));
    let user_id = if audit {
        resolve_user_id(
            ui_user.as_deref(),
            token.as_deref(),
            &state.upstream,
            &base,
        )
        .await
    } else {
        None
    };

    let content_type = headers_in
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let body = read_body(req, &method, &content_type, audit, user_id).await?;

    let mut url = format!("{base}/{path}");
    if let Some(q) = &query {
        url.push('?');
        url.push_str(q);
    }
    debug!(method = %method, %url, audit, "Proxying request upstream");

    let mut builder = state
        .upstream
        .request(method, &url)
        .headers(outbound_headers(&headers_in, &content_type));
    if let (Some(token), false) = (&token, headers_in.contains_key(AUTHORIZATION)) {
        builder = builder.bearer_auth(token);
    }
    if let Some(uid) = user_id {
        builder = builder.header("x-user-id", uid.to_string());
    }

    builder = match body {
        OutboundBody::None => builder,
        OutboundBody::Json(value) => builder.json(&value),
        OutboundBody::Urlencoded(pairs) => builder
            .header(
                CONTENT_TYPE,
                "application/x-www-form-urlencoded;charset=UTF-8",
            )
            .body(
                serde_urlencoded::to_string(&pairs)
                    .map_err(|e| ApiError::internal(e.to_string()))?,
            ),
        OutboundBody::Multipart(form) => builder.multipart(form),
        OutboundBody::Raw(bytes) => {
            if !content_type.is_empty() {
                builder = builder.header(CONTENT_TYPE, content_type.clone());
            }
            builder.body(bytes)
        }
    };

    let upstream_resp = builder.send().await?;
    into_response(upstream_resp).await
}

async fn read_body(
    req: Request,
    method: &Method,
    content_type: &str,
    audit: bool,
    user_id: Option<i64>,
) -> Result<OutboundBody, ApiError> {
    if !matches!(*method, Method::POST | Method::PUT | Method::PATCH) {
        return Ok(OutboundBody::None);
    }

    if content_type.contains("application/json") {
        let bytes = to_bytes(req.into_body(), BODY_LIMIT)
            .await
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        let mut value: serde_json::Value = if bytes.is_empty() {
            serde_json::json!({})
        } else {
            serde_json::from_slice(&bytes)?
        };
        if audit {
            if let (Some(uid), Some(obj)) = (user_id, value.as_object_mut()) {
                for key in [AUDIT_CREATED, AUDIT_UPDATED] {
                    if obj.get(key).map(|v| v.is_null()).unwrap_or(true) {
                        obj.insert(key.to_string(), serde_json::json!(uid));
                    }
                }
            }
        }
        return Ok(OutboundBody::Json(value));
    }

    if content_type.contains("multipart/form-data") {
        let mut multipart = Multipart::from_request(req, &())
            .await
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        let mut form = reqwest::multipart::Form::new();
        let mut seen = Vec::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(e.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            seen.push(name.clone());
            let file_name = field.file_name().map(str::to_string);
            let part_type = field.content_type().map(str::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(e.to_string()))?;
            let mut part = reqwest::multipart::Part::bytes(data.to_vec());
            if let Some(fname) = file_name {
                part = part.file_name(fname);
            }
            if let Some(mime) = part_type {
                part = part
                    .mime_str(&mime)
                    .map_err(|e| ApiError::bad_request(e.to_string()))?;
            }
            form = form.part(name, part);
        }
        if audit {
            if let Some(uid) = user_id {
                for key in [AUDIT_CREATED, AUDIT_UPDATED] {
                    if !seen.iter().any(|n| n == key) {
                        form = form.text(key, uid.to_string());
                    }
                }
            }
        }
        return Ok(OutboundBody::Multipart(form));
    }

    if content_type.contains("application/x-www-form-urlencoded") {
        let bytes = to_bytes(req.into_body(), BODY_LIMIT)
            .await
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        let mut pairs: Vec<(String, String)> =
            serde_urlencoded::from_bytes(&bytes).map_err(|e| ApiError::bad_request(e.to_string()))?;
        if audit {
            if let Some(uid) = user_id {
                for key in [AUDIT_CREATED, AUDIT_UPDATED] {
                    if !pairs.iter().any(|(k, _)| k == key) {
                        pairs.push((key.to_string(), uid.to_string()));
                    }
                }
            }
        }
        return Ok(OutboundBody::Urlencoded(pairs));
    }

    let bytes = to_bytes(req.into_body(), BODY_LIMIT)
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok(OutboundBody::Raw(bytes))
}

/// Request headers forwarded upstream. Framing headers are recomputed
/// by the outbound client; accept headers are pinned so the upstream
/// answers uncompressed JSON.
fn outbound_headers(incoming: &HeaderMap, content_type: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in incoming {
        if [
            HOST,
            CONTENT_LENGTH,
            CONTENT_ENCODING,
            CONTENT_TYPE,
            CONNECTION,
            TRANSFER_ENCODING,
            ACCEPT,
            ACCEPT_ENCODING,
        ]
        .contains(name)
        {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
    if content_type.contains("application/json") {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }
    headers
}

/// Passes the upstream response through verbatim, minus framing headers
/// that no longer apply to the re-buffered body.
async fn into_response(resp: reqwest::Response) -> Result<Response, ApiError> {
    let status = StatusCode::from_u16(resp.status().as_u16())
        .map_err(|e| ApiError::bad_gateway(e.to_string()))?;
    let mut headers = HeaderMap::new();
    // append, not insert: repeated headers (several Set-Cookie lines)
    // must survive the copy
    for (name, value) in resp.headers() {
        if [CONTENT_LENGTH, TRANSFER_ENCODING, CONNECTION].contains(name) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    let bytes = resp.bytes().await?;

    let mut response = Response::builder()
        .status(status)
        .body(Body::from(bytes))
        .map_err(|e| {
            warn!(error = %e, "Failed to assemble proxied response");
            ApiError::internal(e.to_string())
        })?;
    *response.headers_mut() = headers;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_only_on_admin_write_paths() {
        assert!(needs_audit("/admin/cadastrar/imovel"));
        assert!(needs_audit("/admin/editar/proprietario/3"));
        assert!(!needs_audit("/admin/listar/imoveis"));
        assert!(!needs_audit("/admin/excluir/imovel/1"));
        assert!(!needs_audit("/imoveis"));
    }

    #[test]
    fn segment_join_strips_stray_slashes() {
        assert_eq!(join_segments("admin//listar/imoveis/"), "admin/listar/imoveis");
        assert_eq!(join_segments("/estados"), "estados");
        assert_eq!(join_segments(""), "");
    }
}
