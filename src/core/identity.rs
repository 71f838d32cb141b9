use chrono::Utc;
use uuid::Uuid;

use super::Core;
use crate::error::Result;
use crate::types::{Membership, Profile, Provider, Role, User, Workspace};

/// Plan assigned to the workspace provisioned on first login.
pub const DEFAULT_PLAN_ID: &str = "free";

impl Core {
    /// Resolves a provider identity to a local user. The upsert is a
    /// single statement, so two racing logins for the same identity
    /// converge on one row with the later profile.
    ///
    /// A user with no memberships gets a free workspace with an ADMIN
    /// membership, serialized per user so concurrent first logins
    /// provision exactly once.
    pub async fn resolve_identity(&self, provider: Provider, profile: &Profile) -> Result<User> {
        let user = self.store.upsert_user(provider, profile, Utc::now())?;

        let _guard = self.locks.acquire(&format!("user:{}", user.id)).await;
        if self.store.list_user_memberships(&user.id)?.is_empty() {
            self.provision_workspace(&user)?;
        }

        Ok(user)
    }

    fn provision_workspace(&self, user: &User) -> Result<Workspace> {
        self.require_plan(DEFAULT_PLAN_ID)?;

        let now = Utc::now();
        let ws = Workspace {
            id: Uuid::new_v4().to_string(),
            owner_user_id: user.id.clone(),
            plan_id: DEFAULT_PLAN_ID.to_string(),
            storage_used_bytes: 0,
            cancelled_at: None,
            delete_after: None,
            is_read_only: false,
            billing_customer_id: None,
            billing_subscription_id: None,
            created_at: now,
            updated_at: now,
        };
        self.store.create_workspace(&ws)?;
        self.store.insert_membership(&Membership {
            user_id: user.id.clone(),
            workspace_id: ws.id.clone(),
            role: Role::Admin,
            joined_at: now,
        })?;

        tracing::info!(user_id = %user.id, workspace_id = %ws.id, "provisioned workspace on first login");
        Ok(ws)
    }
}
