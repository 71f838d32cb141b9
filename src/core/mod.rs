mod billing;
mod identity;
mod jobs;
mod lifecycle;
mod locks;
mod members;
mod projects;
mod quota;

pub use jobs::{PurgeSummary, ReconciliationSummary};
pub use lifecycle::Lifecycle;

use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::storage::FsObjectStore;
use crate::store::Store;
use crate::types::{Plan, Workspace};
use locks::LockRegistry;

/// Grace window between subscription cancellation and purge.
pub const GRACE_PERIOD_DAYS: i64 = 30;

/// The consistency core. Every mutation that spans more than one
/// statement goes through here so the per-workspace lock discipline
/// lives in one place instead of in each handler.
#[derive(Clone)]
pub struct Core {
    store: Arc<dyn Store>,
    objects: Arc<FsObjectStore>,
    locks: LockRegistry,
}

impl Core {
    pub fn new(store: Arc<dyn Store>, objects: Arc<FsObjectStore>) -> Self {
        Self {
            store,
            objects,
            locks: LockRegistry::new(),
        }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Object-store prefix holding everything a workspace owns.
    fn workspace_prefix(workspace_id: &str) -> String {
        format!("workspace_{workspace_id}")
    }

    fn project_prefix(workspace_id: &str, project_id: &str) -> String {
        format!("workspace_{workspace_id}/project_{project_id}")
    }

    fn require_workspace(&self, id: &str) -> Result<Workspace> {
        self.store.get_workspace(id)?.ok_or(Error::NotFound)
    }

    fn require_plan(&self, id: &str) -> Result<Plan> {
        self.store
            .get_plan(id)?
            .ok_or_else(|| Error::Config(format!("plan '{id}' is not seeded")))
    }

    pub fn stats(&self) -> Result<Stats> {
        Ok(Stats {
            users: self.store.count_users()?,
            workspaces: self.store.count_workspaces()?,
            projects: self.store.count_projects()?,
            total_storage_used_bytes: self.store.total_storage_used()?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct Stats {
    pub users: i64,
    pub workspaces: i64,
    pub projects: i64,
    pub total_storage_used_bytes: i64,
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::store::SqliteStore;
    use crate::types::*;
    use chrono::Utc;
    use tempfile::TempDir;

    pub fn test_core() -> (TempDir, Core) {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        let objects = FsObjectStore::new(temp.path());
        let core = Core::new(Arc::new(store), Arc::new(objects));
        (temp, core)
    }

    pub fn seed_plan(core: &Core, id: &str, storage_limit_bytes: i64, max_members: i32) {
        core.store()
            .create_plan(&Plan {
                id: id.to_string(),
                name: id.to_string(),
                price_cents: 0,
                storage_limit_bytes,
                max_members,
                created_at: Utc::now(),
            })
            .unwrap();
    }

    pub fn seed_user(core: &Core, email: &str) -> User {
        core.store()
            .upsert_user(
                Provider::Github,
                &Profile {
                    provider_user_id: email.to_string(),
                    email: email.to_string(),
                    display_name: None,
                    avatar_url: None,
                },
                Utc::now(),
            )
            .unwrap()
    }

    pub fn seed_workspace(core: &Core, id: &str, owner: &str, plan: &str) -> Workspace {
        let now = Utc::now();
        let ws = Workspace {
            id: id.to_string(),
            owner_user_id: owner.to_string(),
            plan_id: plan.to_string(),
            storage_used_bytes: 0,
            cancelled_at: None,
            delete_after: None,
            is_read_only: false,
            billing_customer_id: None,
            billing_subscription_id: None,
            created_at: now,
            updated_at: now,
        };
        core.store().create_workspace(&ws).unwrap();
        ws
    }

    pub fn seed_project(core: &Core, id: &str, workspace_id: &str, name: &str) -> Project {
        let now = Utc::now();
        let project = Project {
            id: id.to_string(),
            workspace_id: workspace_id.to_string(),
            name: name.to_string(),
            description: None,
            created_at: now,
            updated_at: now,
        };
        core.store().create_project(&project).unwrap();
        project
    }
}
