use std::sync::Arc;

use axum::{
    Router, body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, header},
    response::IntoResponse,
    routing::{delete, get, put},
};

use super::dto::{FileResponse, GenerationQuery};
use super::response::{ApiError, ApiResponse};
use super::workspaces::require_role;
use crate::auth::RequireUser;
use crate::server::AppState;
use crate::storage::ObjectInfo;
use crate::types::Role;

/// Response header carrying the generation token on raw file reads;
/// clients echo it back as `expected_generation` when they write.
pub const GENERATION_HEADER: &str = "x-generation";

pub fn file_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/workspaces/{id}/projects/{project_id}/files", get(list_files))
        .route(
            "/workspaces/{id}/projects/{project_id}/files/{*path}",
            get(read_file),
        )
        .route(
            "/workspaces/{id}/projects/{project_id}/files/{*path}",
            put(write_file),
        )
        .route(
            "/workspaces/{id}/projects/{project_id}/files/{*path}",
            delete(delete_file),
        )
}

async fn list_files(
    State(state): State<Arc<AppState>>,
    auth: RequireUser,
    Path((id, project_id)): Path<(String, String)>,
) -> Result<ApiResponse<Vec<ObjectInfo>>, ApiError> {
    require_role(&state, &auth.user, &id, Role::User)?;
    Ok(ApiResponse::success(
        state.core.list_files(&id, &project_id).await?,
    ))
}

async fn read_file(
    State(state): State<Arc<AppState>>,
    auth: RequireUser,
    Path((id, project_id, path)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&state, &auth.user, &id, Role::User)?;

    let (content, meta) = state.core.read_file(&id, &project_id, &path).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    if let Ok(value) = HeaderValue::from_str(&meta.generation.to_string()) {
        headers.insert(GENERATION_HEADER, value);
    }

    Ok((headers, content))
}

async fn write_file(
    State(state): State<Arc<AppState>>,
    auth: RequireUser,
    Path((id, project_id, path)): Path<(String, String, String)>,
    Query(query): Query<GenerationQuery>,
    body: Bytes,
) -> Result<ApiResponse<FileResponse>, ApiError> {
    require_role(&state, &auth.user, &id, Role::User)?;

    let meta = state
        .core
        .write_file(&id, &project_id, &path, &body, query.expected_generation)
        .await?;
    Ok(ApiResponse::success(FileResponse { path, meta }))
}

async fn delete_file(
    State(state): State<Arc<AppState>>,
    auth: RequireUser,
    Path((id, project_id, path)): Path<(String, String, String)>,
    Query(query): Query<GenerationQuery>,
) -> Result<ApiResponse<()>, ApiError> {
    require_role(&state, &auth.user, &id, Role::User)?;

    state
        .core
        .delete_file(&id, &project_id, &path, query.expected_generation)
        .await?;
    Ok(ApiResponse::success(()))
}
