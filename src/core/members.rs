use chrono::Utc;

use super::{Core, lifecycle};
use crate::error::{Error, Result};
use crate::types::{Membership, Role};

impl Core {
    /// Adds a member, enforcing the plan's team cap. Count and insert
    /// run under the workspace lock, so two racing invites at the cap
    /// cannot both pass the count.
    pub async fn add_member(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: Role,
    ) -> Result<Membership> {
        let _guard = self.locks.acquire(workspace_id).await;

        let ws = self.require_workspace(workspace_id)?;
        lifecycle::ensure_writable(&ws)?;
        let plan = self.require_plan(&ws.plan_id)?;

        self.store.get_user(user_id)?.ok_or(Error::NotFound)?;

        let count = self.store.count_memberships(workspace_id)?;
        if count >= plan.max_members {
            return Err(Error::TeamLimitExceeded {
                limit: plan.max_members,
            });
        }

        let membership = Membership {
            user_id: user_id.to_string(),
            workspace_id: workspace_id.to_string(),
            role,
            joined_at: Utc::now(),
        };
        self.store.insert_membership(&membership)?;
        Ok(membership)
    }

    /// Removes a member. Like every membership mutation this is refused
    /// once the workspace goes read-only.
    pub async fn remove_member(&self, workspace_id: &str, user_id: &str) -> Result<()> {
        let _guard = self.locks.acquire(workspace_id).await;

        let ws = self.require_workspace(workspace_id)?;
        lifecycle::ensure_writable(&ws)?;

        if !self.store.delete_membership(user_id, workspace_id)? {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    pub fn list_members(&self, workspace_id: &str) -> Result<Vec<Membership>> {
        self.require_workspace(workspace_id)?;
        self.store.list_memberships(workspace_id)
    }
}
