use chrono::Utc;
use uuid::Uuid;

use super::{Core, lifecycle};
use crate::error::Result;
use crate::types::Project;

impl Core {
    pub async fn create_project(
        &self,
        workspace_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Project> {
        let _guard = self.locks.acquire(workspace_id).await;

        let ws = self.require_workspace(workspace_id)?;
        lifecycle::ensure_writable(&ws)?;

        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4().to_string(),
            workspace_id: workspace_id.to_string(),
            name: name.to_string(),
            description: description.map(String::from),
            created_at: now,
            updated_at: now,
        };
        self.store.create_project(&project)?;
        Ok(project)
    }

    pub fn list_projects(&self, workspace_id: &str) -> Result<Vec<Project>> {
        self.require_workspace(workspace_id)?;
        self.store.list_projects(workspace_id)
    }

    /// Deletes a project and all of its objects, returning the freed
    /// bytes to the quota ledger in the same critical section.
    pub async fn delete_project(&self, workspace_id: &str, project_id: &str) -> Result<()> {
        let _guard = self.locks.acquire(workspace_id).await;
        self.require_project(workspace_id, project_id)?;

        let prefix = Self::project_prefix(workspace_id, project_id);
        let freed: i64 = self
            .objects
            .list_prefix(&prefix)
            .await?
            .iter()
            .map(|info| info.size)
            .sum();

        self.reserve_and_apply_locked(workspace_id, -freed, async || {
            self.objects.delete_prefix(&prefix).await?;
            self.store.delete_project(project_id)?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use crate::core::testing::*;
    use crate::error::Error;

    #[tokio::test]
    async fn test_create_and_list() {
        let (_temp, core) = test_core();
        seed_plan(&core, "free", 1024, 1);
        let user = seed_user(&core, "a@example.com");
        seed_workspace(&core, "ws-1", &user.id, "free");

        core.create_project("ws-1", "api", Some("backend"))
            .await
            .unwrap();
        core.create_project("ws-1", "web", None).await.unwrap();

        let projects = core.list_projects("ws-1").unwrap();
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].name, "api");

        let result = core.create_project("ws-1", "api", None).await;
        assert!(matches!(result, Err(Error::AlreadyExists)));
    }

    #[tokio::test]
    async fn test_delete_project_frees_quota() {
        let (_temp, core) = test_core();
        seed_plan(&core, "free", 100, 1);
        let user = seed_user(&core, "a@example.com");
        seed_workspace(&core, "ws-1", &user.id, "free");
        let project = core.create_project("ws-1", "api", None).await.unwrap();

        core.write_file("ws-1", &project.id, "a.txt", b"12345", None)
            .await
            .unwrap();
        core.write_file("ws-1", &project.id, "b.txt", b"123", None)
            .await
            .unwrap();

        core.delete_project("ws-1", &project.id).await.unwrap();

        let ws = core.store().get_workspace("ws-1").unwrap().unwrap();
        assert_eq!(ws.storage_used_bytes, 0);
        assert!(core.list_projects("ws-1").unwrap().is_empty());
        assert!(matches!(
            core.delete_project("ws-1", &project.id).await,
            Err(Error::NotFound)
        ));
    }
}
