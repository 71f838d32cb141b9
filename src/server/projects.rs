use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};

use super::dto::CreateProjectRequest;
use super::response::{ApiError, ApiResponse};
use super::workspaces::require_role;
use crate::auth::RequireUser;
use crate::server::AppState;
use crate::types::{Project, Role};

pub fn project_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/workspaces/{id}/projects", get(list_projects))
        .route("/workspaces/{id}/projects", post(create_project))
        .route(
            "/workspaces/{id}/projects/{project_id}",
            delete(delete_project),
        )
}

async fn list_projects(
    State(state): State<Arc<AppState>>,
    auth: RequireUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<Vec<Project>>, ApiError> {
    require_role(&state, &auth.user, &id, Role::User)?;
    Ok(ApiResponse::success(state.core.list_projects(&id)?))
}

async fn create_project(
    State(state): State<Arc<AppState>>,
    auth: RequireUser,
    Path(id): Path<String>,
    Json(body): Json<CreateProjectRequest>,
) -> Result<ApiResponse<Project>, ApiError> {
    require_role(&state, &auth.user, &id, Role::Mod)?;

    if body.name.trim().is_empty() {
        return Err(ApiError::bad_request("Project name cannot be empty"));
    }

    let project = state
        .core
        .create_project(&id, body.name.trim(), body.description.as_deref())
        .await?;
    Ok(ApiResponse::success(project))
}

async fn delete_project(
    State(state): State<Arc<AppState>>,
    auth: RequireUser,
    Path((id, project_id)): Path<(String, String)>,
) -> Result<ApiResponse<()>, ApiError> {
    require_role(&state, &auth.user, &id, Role::Mod)?;

    state.core.delete_project(&id, &project_id).await?;
    Ok(ApiResponse::success(()))
}
