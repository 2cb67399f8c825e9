//! Page-level middleware: the admin login gate and security headers.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::CookieJar;
use tracing::debug;

use crate::session::is_access_valid;
use crate::session::tokens::ACCESS_COOKIE;

const CSP: &str = "default-src 'self'; \
    script-src 'self' 'unsafe-inline' blob: data:; \
    style-src 'self' 'unsafe-inline' blob: data:; \
    img-src 'self' data: blob: https:; \
    font-src 'self' data:; \
    connect-src 'self' https: http: ws: wss:; \
    frame-ancestors 'none'; \
    base-uri 'self'; \
    form-action 'self'";

/// Redirects unauthenticated requests for `/admin/*` pages to the login
/// page, preserving the requested path for the post-login redirect.
/// API calls are not redirected; they answer 401 on their own.
pub async fn admin_page_guard(jar: CookieJar, req: Request, next: Next) -> Response {
    let path = req.uri().path();
    if path.starts_with("/admin") {
        let token = jar.get(ACCESS_COOKIE).map(|c| c.value().to_string());
        if !is_access_valid(token.as_deref()) {
            debug!(%path, "Unauthenticated admin page access, redirecting to login");
            let query = serde_urlencoded::to_string([("next", path)]).unwrap_or_default();
            return Redirect::to(&format!("/login?{query}")).into_response();
        }
    }
    next.run(req).await
}

/// Attaches a conservative CSP and frame denial to page responses.
/// API responses are skipped; they are consumed by fetch, not rendered.
pub async fn security_headers(req: Request, next: Next) -> Response {
    let is_api = req.uri().path().starts_with("/api");
    let mut response = next.run(req).await;
    if !is_api {
        let headers = response.headers_mut();
        headers.insert("content-security-policy", HeaderValue::from_static(CSP));
        headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    }
    response
}
