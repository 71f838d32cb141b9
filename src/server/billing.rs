use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::post};
use serde_json::Value;

use super::response::{ApiError, ApiResponse};
use crate::auth::RequireAdmin;
use crate::server::AppState;
use crate::types::BillingEvent;

pub fn billing_router() -> Router<Arc<AppState>> {
    Router::new().route("/webhooks/billing", post(billing_webhook))
}

/// Payment-processor webhook. Guarded by the shared admin secret in
/// place of signature verification; the payload is normalized into a
/// typed event before anything touches the database.
async fn billing_webhook(
    State(state): State<Arc<AppState>>,
    _admin: RequireAdmin,
    Json(raw): Json<Value>,
) -> Result<ApiResponse<()>, ApiError> {
    let event = BillingEvent::normalize(&raw)?;
    state.core.apply_event(&event).await?;
    Ok(ApiResponse::success(()))
}
