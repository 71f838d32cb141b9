use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde_json::Value;

use super::dto::{MeResponse, SessionResponse};
use super::response::{ApiError, ApiResponse};
use crate::auth::{RequireUser, issue_session};
use crate::server::AppState;
use crate::types::{Plan, Provider};

pub fn identity_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/callback/{provider}", post(identity_callback))
        .route("/auth/logout", post(logout))
        .route("/me", get(me))
        .route("/plans", get(list_plans))
}

/// Terminates the identity flow: the raw provider profile arrives here
/// after the upstream OAuth exchange, gets normalized, upserted, and
/// answered with a fresh session token.
async fn identity_callback(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Json(raw): Json<Value>,
) -> Result<ApiResponse<SessionResponse>, ApiError> {
    let provider = Provider::parse(&provider)?;
    let profile = provider.resolve(&raw)?;

    let user = state.core.resolve_identity(provider, &profile).await?;
    let token = issue_session(state.core.store(), &state.tokens, &user)?;

    Ok(ApiResponse::success(SessionResponse { token, user }))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    auth: RequireUser,
) -> Result<ApiResponse<()>, ApiError> {
    state.core.store().delete_session(&auth.session.id)?;
    Ok(ApiResponse::success(()))
}

async fn me(
    State(state): State<Arc<AppState>>,
    auth: RequireUser,
) -> Result<ApiResponse<MeResponse>, ApiError> {
    let memberships = state.core.store().list_user_memberships(&auth.user.id)?;
    Ok(ApiResponse::success(MeResponse {
        user: auth.user,
        memberships,
    }))
}

async fn list_plans(
    State(state): State<Arc<AppState>>,
) -> Result<ApiResponse<Vec<Plan>>, ApiError> {
    Ok(ApiResponse::success(state.core.store().list_plans()?))
}
