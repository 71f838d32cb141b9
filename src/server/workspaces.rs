use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};

use super::dto::{AddMemberRequest, ExportManifest, WorkspaceResponse};
use super::response::{ApiError, ApiResponse, StoreOptionExt};
use crate::auth::RequireUser;
use crate::server::AppState;
use crate::types::{Membership, Role, User};

pub fn workspace_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/workspaces", get(list_workspaces))
        .route("/workspaces/{id}", get(get_workspace))
        .route("/workspaces/{id}/export", get(export_workspace))
        .route("/workspaces/{id}/members", get(list_members))
        .route("/workspaces/{id}/members", post(add_member))
        .route("/workspaces/{id}/members/{user_id}", delete(remove_member))
}

/// Requires the caller to be a member with at least `role`.
pub(super) fn require_role(
    state: &AppState,
    user: &User,
    workspace_id: &str,
    role: Role,
) -> Result<Membership, ApiError> {
    let membership = state
        .core
        .store()
        .get_membership(&user.id, workspace_id)?
        .ok_or_else(|| ApiError::not_found("Workspace not found"))?;

    if !membership.role.at_least(role) {
        return Err(ApiError::forbidden("Insufficient role"));
    }
    Ok(membership)
}

async fn list_workspaces(
    State(state): State<Arc<AppState>>,
    auth: RequireUser,
) -> Result<ApiResponse<Vec<WorkspaceResponse>>, ApiError> {
    let mut workspaces = Vec::new();
    for membership in state.core.store().list_user_memberships(&auth.user.id)? {
        if let Some(ws) = state.core.store().get_workspace(&membership.workspace_id)? {
            workspaces.push(WorkspaceResponse::from(ws));
        }
    }
    Ok(ApiResponse::success(workspaces))
}

async fn get_workspace(
    State(state): State<Arc<AppState>>,
    auth: RequireUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<WorkspaceResponse>, ApiError> {
    require_role(&state, &auth.user, &id, Role::User)?;

    let ws = state
        .core
        .store()
        .get_workspace(&id)?
        .or_not_found("Workspace not found")?;
    Ok(ApiResponse::success(WorkspaceResponse::from(ws)))
}

/// Export manifest: available while active and through the grace
/// window, refused with 410 once it has passed.
async fn export_workspace(
    State(state): State<Arc<AppState>>,
    auth: RequireUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<ExportManifest>, ApiError> {
    require_role(&state, &auth.user, &id, Role::User)?;

    let files = state.core.export_manifest(&id).await?;
    let total_bytes = files.iter().map(|f| f.size).sum();
    Ok(ApiResponse::success(ExportManifest {
        workspace_id: id,
        total_bytes,
        files,
    }))
}

async fn list_members(
    State(state): State<Arc<AppState>>,
    auth: RequireUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<Vec<Membership>>, ApiError> {
    require_role(&state, &auth.user, &id, Role::User)?;
    Ok(ApiResponse::success(state.core.list_members(&id)?))
}

async fn add_member(
    State(state): State<Arc<AppState>>,
    auth: RequireUser,
    Path(id): Path<String>,
    Json(body): Json<AddMemberRequest>,
) -> Result<ApiResponse<Membership>, ApiError> {
    require_role(&state, &auth.user, &id, Role::Admin)?;

    let invitee = state
        .core
        .store()
        .get_user_by_email(&body.email)?
        .or_not_found("No user with that email")?;

    let membership = state.core.add_member(&id, &invitee.id, body.role).await?;
    Ok(ApiResponse::success(membership))
}

async fn remove_member(
    State(state): State<Arc<AppState>>,
    auth: RequireUser,
    Path((id, user_id)): Path<(String, String)>,
) -> Result<ApiResponse<()>, ApiError> {
    require_role(&state, &auth.user, &id, Role::Admin)?;

    state.core.remove_member(&id, &user_id).await?;
    Ok(ApiResponse::success(()))
}
