pub mod auth;
mod cep;
pub mod error;
pub mod guard;

use axum::{
    extract::DefaultBodyLimit,
    routing::{any, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::proxy;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let auth_routes = Router::new()
        .route("/csrf", get(auth::csrf))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/refresh", post(auth::refresh));

    // Static routes win over the wildcard, so the auth and CEP routes
    // are never proxied.
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .route("/api/cep", get(cep::lookup))
        .route(
            "/api/*path",
            any(proxy::forward).layer(DefaultBodyLimit::max(proxy::BODY_LIMIT)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
