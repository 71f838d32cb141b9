use chrono::Utc;
use serde::Serialize;

use super::Core;
use crate::error::Result;

#[derive(Debug, Default, Serialize)]
pub struct ReconciliationSummary {
    pub workspaces_checked: u64,
    pub workspaces_corrected: u64,
    pub errors: Vec<String>,
}

#[derive(Debug, Default, Serialize)]
pub struct PurgeSummary {
    pub workspaces_purged: u64,
    pub objects_removed: u64,
    pub errors: Vec<String>,
}

impl Core {
    /// Walks every workspace and overwrites its storage ledger with the
    /// summed size of its objects on disk. The listing runs without the
    /// workspace lock; only the ledger overwrite takes it, so a long
    /// scan never stalls foreground writes.
    ///
    /// A workspace that fails is recorded and skipped; one bad tenant
    /// must not abort the sweep.
    pub async fn run_reconciliation(&self) -> Result<ReconciliationSummary> {
        let mut summary = ReconciliationSummary::default();

        for workspace_id in self.store.list_workspace_ids()? {
            summary.workspaces_checked += 1;
            if let Err(e) = self.reconcile_workspace(&workspace_id, &mut summary).await {
                tracing::warn!(workspace_id, error = %e, "reconciliation failed for workspace");
                summary.errors.push(format!("{workspace_id}: {e}"));
            }
        }

        tracing::info!(
            checked = summary.workspaces_checked,
            corrected = summary.workspaces_corrected,
            errors = summary.errors.len(),
            "reconciliation run complete"
        );
        Ok(summary)
    }

    async fn reconcile_workspace(
        &self,
        workspace_id: &str,
        summary: &mut ReconciliationSummary,
    ) -> Result<()> {
        let actual = self
            .objects
            .usage(&Self::workspace_prefix(workspace_id))
            .await?;

        let Some(ws) = self.store.get_workspace(workspace_id)? else {
            return Ok(()); // purged mid-scan
        };
        if ws.storage_used_bytes == actual {
            return Ok(());
        }

        let _guard = self.locks.acquire(workspace_id).await;
        // Re-read under the lock: a write may have landed since the scan.
        let Some(ws) = self.store.get_workspace(workspace_id)? else {
            return Ok(());
        };
        let actual = self
            .objects
            .usage(&Self::workspace_prefix(workspace_id))
            .await?;
        if ws.storage_used_bytes != actual {
            tracing::info!(
                workspace_id,
                ledger = ws.storage_used_bytes,
                actual,
                "correcting storage ledger drift"
            );
            self.store.set_storage_used(workspace_id, actual)?;
            summary.workspaces_corrected += 1;
        }
        Ok(())
    }

    /// Deletes workspaces whose grace window has passed: objects first,
    /// then the row. The selection predicate (`delete_after < now`)
    /// makes re-runs no-ops, and a crash between the two deletes just
    /// leaves the row to be picked up again.
    pub async fn run_purge(&self) -> Result<PurgeSummary> {
        let mut summary = PurgeSummary::default();

        for ws in self.store.list_purgeable_workspaces(Utc::now())? {
            match self.purge_workspace(&ws.id).await {
                Ok(removed) => {
                    summary.workspaces_purged += 1;
                    summary.objects_removed += removed;
                }
                Err(e) => {
                    tracing::warn!(workspace_id = %ws.id, error = %e, "purge failed for workspace");
                    summary.errors.push(format!("{}: {e}", ws.id));
                }
            }
        }

        tracing::info!(
            purged = summary.workspaces_purged,
            objects = summary.objects_removed,
            errors = summary.errors.len(),
            "purge run complete"
        );
        Ok(summary)
    }

    async fn purge_workspace(&self, workspace_id: &str) -> Result<u64> {
        let _guard = self.locks.acquire(workspace_id).await;

        // Re-check under the lock: a billing event may have reactivated
        // the workspace since the listing.
        let still_purgeable = self
            .store
            .get_workspace(workspace_id)?
            .is_some_and(|ws| ws.delete_after.is_some_and(|d| d < Utc::now()));
        if !still_purgeable {
            return Ok(0);
        }

        let removed = self
            .objects
            .delete_prefix(&Self::workspace_prefix(workspace_id))
            .await?;
        self.store.delete_workspace(workspace_id)?;

        tracing::info!(workspace_id, objects = removed, "workspace purged");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use crate::core::testing::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_reconciliation_corrects_drift() {
        let (_temp, core) = test_core();
        seed_plan(&core, "free", 100, 1);
        let user = seed_user(&core, "a@example.com");
        seed_workspace(&core, "ws-1", &user.id, "free");
        let project = core.create_project("ws-1", "api", None).await.unwrap();

        core.write_file("ws-1", &project.id, "a.txt", b"12345", None)
            .await
            .unwrap();

        // Induce drift: the ledger claims more than is on disk.
        core.store().set_storage_used("ws-1", 90).unwrap();

        let summary = core.run_reconciliation().await.unwrap();
        assert_eq!(summary.workspaces_checked, 1);
        assert_eq!(summary.workspaces_corrected, 1);
        assert!(summary.errors.is_empty());

        let ws = core.store().get_workspace("ws-1").unwrap().unwrap();
        assert_eq!(ws.storage_used_bytes, 5);

        // Converged; a second run corrects nothing.
        let summary = core.run_reconciliation().await.unwrap();
        assert_eq!(summary.workspaces_corrected, 0);
    }

    #[tokio::test]
    async fn test_purge_removes_objects_and_rows() {
        let (_temp, core) = test_core();
        seed_plan(&core, "free", 100, 1);
        let user = seed_user(&core, "a@example.com");
        seed_workspace(&core, "ws-1", &user.id, "free");
        seed_workspace(&core, "ws-2", &user.id, "free");
        let project = core.create_project("ws-1", "api", None).await.unwrap();
        core.write_file("ws-1", &project.id, "a.txt", b"12345", None)
            .await
            .unwrap();

        let long_ago = Utc::now() - Duration::days(45);
        core.store()
            .mark_cancelled("ws-1", long_ago, long_ago + Duration::days(30))
            .unwrap();

        let summary = core.run_purge().await.unwrap();
        assert_eq!(summary.workspaces_purged, 1);
        assert_eq!(summary.objects_removed, 1);

        assert!(core.store().get_workspace("ws-1").unwrap().is_none());
        assert!(core.store().get_workspace("ws-2").unwrap().is_some());

        // Idempotent: nothing matches the predicate anymore.
        let summary = core.run_purge().await.unwrap();
        assert_eq!(summary.workspaces_purged, 0);
    }

    #[tokio::test]
    async fn test_purge_skips_workspaces_still_in_grace() {
        let (_temp, core) = test_core();
        seed_plan(&core, "free", 100, 1);
        let user = seed_user(&core, "a@example.com");
        seed_workspace(&core, "ws-1", &user.id, "free");

        let now = Utc::now();
        core.store()
            .mark_cancelled("ws-1", now, now + Duration::days(30))
            .unwrap();

        let summary = core.run_purge().await.unwrap();
        assert_eq!(summary.workspaces_purged, 0);
        assert!(core.store().get_workspace("ws-1").unwrap().is_some());
    }
}
