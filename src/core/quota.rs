use chrono::Utc;

use super::{Core, lifecycle};
use crate::error::{Error, Result};
use crate::storage::{ObjectInfo, ObjectMeta};
use crate::types::Project;

impl Core {
    /// Reserves `delta_bytes` against the workspace quota, runs `apply`,
    /// and commits the delta to the ledger only if `apply` succeeds.
    ///
    /// The whole sequence runs under the workspace lock, so concurrent
    /// reservations serialize and the check-then-write cannot interleave.
    /// If `apply` fails after a partial external effect (an object was
    /// written but we never get here again), the ledger is left
    /// untouched and reconciliation heals the drift.
    pub async fn reserve_and_apply<T, F>(
        &self,
        workspace_id: &str,
        delta_bytes: i64,
        apply: F,
    ) -> Result<T>
    where
        F: AsyncFnOnce() -> Result<T>,
    {
        let _guard = self.locks.acquire(workspace_id).await;
        self.reserve_and_apply_locked(workspace_id, delta_bytes, apply)
            .await
    }

    /// Caller must hold the workspace lock.
    pub(super) async fn reserve_and_apply_locked<T, F>(
        &self,
        workspace_id: &str,
        delta_bytes: i64,
        apply: F,
    ) -> Result<T>
    where
        F: AsyncFnOnce() -> Result<T>,
    {
        let ws = self.require_workspace(workspace_id)?;
        lifecycle::ensure_writable(&ws)?;

        if delta_bytes > 0 {
            let plan = self.require_plan(&ws.plan_id)?;
            let would_use = ws.storage_used_bytes + delta_bytes;
            if would_use > plan.storage_limit_bytes {
                return Err(Error::QuotaExceeded {
                    would_use,
                    limit: plan.storage_limit_bytes,
                });
            }
        }

        let value = apply().await?;

        let new_used = (ws.storage_used_bytes + delta_bytes).max(0);
        self.store.set_storage_used(workspace_id, new_used)?;
        Ok(value)
    }

    /// Writes a file through the quota ledger. The delta is the size
    /// difference against whatever the path currently holds, computed
    /// under the lock so overwrites account correctly.
    pub async fn write_file(
        &self,
        workspace_id: &str,
        project_id: &str,
        path: &str,
        data: &[u8],
        expected_generation: Option<u64>,
    ) -> Result<ObjectMeta> {
        let _guard = self.locks.acquire(workspace_id).await;
        self.require_project(workspace_id, project_id)?;

        let prefix = Self::project_prefix(workspace_id, project_id);
        let old_size = self
            .objects
            .stat(&prefix, path)
            .await?
            .map_or(0, |m| m.size);
        let delta = data.len() as i64 - old_size;

        self.reserve_and_apply_locked(workspace_id, delta, async || {
            self.objects
                .write(&prefix, path, data, expected_generation)
                .await
        })
        .await
    }

    /// Deletes a file and returns its freed size to the ledger.
    pub async fn delete_file(
        &self,
        workspace_id: &str,
        project_id: &str,
        path: &str,
        expected_generation: Option<u64>,
    ) -> Result<i64> {
        let _guard = self.locks.acquire(workspace_id).await;
        self.require_project(workspace_id, project_id)?;

        let prefix = Self::project_prefix(workspace_id, project_id);
        let meta = self.objects.stat(&prefix, path).await?.ok_or(Error::NotFound)?;

        self.reserve_and_apply_locked(workspace_id, -meta.size, async || {
            self.objects
                .delete(&prefix, path, expected_generation)
                .await
        })
        .await
    }

    pub async fn read_file(
        &self,
        workspace_id: &str,
        project_id: &str,
        path: &str,
    ) -> Result<(Vec<u8>, ObjectMeta)> {
        let ws = self.require_workspace(workspace_id)?;
        lifecycle::ensure_exportable(&ws, Utc::now())?;
        self.require_project(workspace_id, project_id)?;

        let prefix = Self::project_prefix(workspace_id, project_id);
        self.objects.read(&prefix, path).await
    }

    pub async fn list_files(
        &self,
        workspace_id: &str,
        project_id: &str,
    ) -> Result<Vec<ObjectInfo>> {
        self.require_workspace(workspace_id)?;
        self.require_project(workspace_id, project_id)?;

        let prefix = Self::project_prefix(workspace_id, project_id);
        self.objects.list_prefix(&prefix).await
    }

    /// Export manifest: every object in the workspace with sizes and
    /// generations. Available while active and for the whole grace
    /// window; refused once the window has passed.
    pub async fn export_manifest(&self, workspace_id: &str) -> Result<Vec<ObjectInfo>> {
        let ws = self.require_workspace(workspace_id)?;
        lifecycle::ensure_exportable(&ws, Utc::now())?;

        self.objects
            .list_prefix(&Self::workspace_prefix(workspace_id))
            .await
    }

    pub(super) fn require_project(&self, workspace_id: &str, project_id: &str) -> Result<Project> {
        self.store
            .get_project(project_id)?
            .filter(|p| p.workspace_id == workspace_id)
            .ok_or(Error::NotFound)
    }
}
