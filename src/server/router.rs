use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Router, routing::get};

use super::admin::admin_router;
use super::billing::billing_router;
use super::files::file_router;
use super::identity::identity_router;
use super::projects::project_router;
use super::workspaces::workspace_router;
use crate::auth::TokenGenerator;
use crate::core::Core;

pub struct AppState {
    pub core: Core,
    pub tokens: TokenGenerator,
    /// Shared secret for admin endpoints and the billing webhook.
    pub admin_secret: String,
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1/admin", admin_router())
        .nest("/api/v1", identity_router())
        .nest("/api/v1", workspace_router())
        .nest("/api/v1", project_router())
        .nest("/api/v1", file_router())
        .nest("/api/v1", billing_router())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
