use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    routing::{get, post},
};

use super::response::{ApiError, ApiResponse};
use crate::auth::RequireAdmin;
use crate::core::{PurgeSummary, ReconciliationSummary, Stats};
use crate::server::AppState;

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs/reconciliation", post(run_reconciliation))
        .route("/jobs/purge", post(run_purge))
        .route("/stats", get(stats))
}

/// External schedulers POST here on their own cadence; each run returns
/// its summary so the scheduler can alert on errors.
async fn run_reconciliation(
    State(state): State<Arc<AppState>>,
    _admin: RequireAdmin,
) -> Result<ApiResponse<ReconciliationSummary>, ApiError> {
    Ok(ApiResponse::success(state.core.run_reconciliation().await?))
}

async fn run_purge(
    State(state): State<Arc<AppState>>,
    _admin: RequireAdmin,
) -> Result<ApiResponse<PurgeSummary>, ApiError> {
    Ok(ApiResponse::success(state.core.run_purge().await?))
}

async fn stats(
    State(state): State<Arc<AppState>>,
    _admin: RequireAdmin,
) -> Result<ApiResponse<Stats>, ApiError> {
    Ok(ApiResponse::success(state.core.stats()?))
}
