use serde::{Deserialize, Serialize};

use crate::core::Lifecycle;
use crate::storage::{ObjectInfo, ObjectMeta};
use crate::types::{Membership, Role, User, Workspace};

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub memberships: Vec<Membership>,
}

#[derive(Debug, Serialize)]
pub struct WorkspaceResponse {
    #[serde(flatten)]
    pub workspace: Workspace,
    pub lifecycle: Lifecycle,
}

impl From<Workspace> for WorkspaceResponse {
    fn from(workspace: Workspace) -> Self {
        Self {
            lifecycle: Lifecycle::of(&workspace),
            workspace,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// CAS precondition for file writes and deletes. Absent means
/// "create only" on write and "unconditional" on delete.
#[derive(Debug, Deserialize)]
pub struct GenerationQuery {
    pub expected_generation: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub path: String,
    #[serde(flatten)]
    pub meta: ObjectMeta,
}

#[derive(Debug, Serialize)]
pub struct ExportManifest {
    pub workspace_id: String,
    pub total_bytes: i64,
    pub files: Vec<ObjectInfo>,
}
