mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
///
/// Methods here are individually atomic; multi-step invariants (quota,
/// member caps, lifecycle transitions) are serialized by the caller
/// holding the per-workspace lock.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Plan operations
    fn create_plan(&self, plan: &Plan) -> Result<()>;
    fn get_plan(&self, id: &str) -> Result<Option<Plan>>;
    fn list_plans(&self) -> Result<Vec<Plan>>;

    // User operations
    /// Atomic insert-or-update keyed on (provider, provider_user_id).
    /// Returns the resulting row either way; `last_login_at` is bumped
    /// and profile fields refreshed on both paths.
    fn upsert_user(&self, provider: Provider, profile: &Profile, now: DateTime<Utc>)
    -> Result<User>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    fn count_users(&self) -> Result<i64>;

    // Workspace operations
    fn create_workspace(&self, ws: &Workspace) -> Result<()>;
    fn get_workspace(&self, id: &str) -> Result<Option<Workspace>>;
    fn get_workspace_by_subscription(&self, subscription_id: &str) -> Result<Option<Workspace>>;
    fn list_workspace_ids(&self) -> Result<Vec<String>>;
    fn list_purgeable_workspaces(&self, now: DateTime<Utc>) -> Result<Vec<Workspace>>;
    fn set_storage_used(&self, id: &str, storage_used_bytes: i64) -> Result<()>;
    fn set_billing_customer(&self, id: &str, customer_id: &str) -> Result<()>;
    /// Guarded cancellation: stamps `cancelled_at`/`delete_after` and
    /// flips read-only only if the workspace is not already cancelled.
    /// Returns false (no-op) when the guard fails.
    fn mark_cancelled(
        &self,
        id: &str,
        cancelled_at: DateTime<Utc>,
        delete_after: DateTime<Utc>,
    ) -> Result<bool>;
    /// Clears cancellation fields and read-only, optionally binding a
    /// new subscription id and plan.
    fn reactivate(
        &self,
        id: &str,
        subscription_id: Option<&str>,
        plan_id: Option<&str>,
    ) -> Result<()>;
    fn delete_workspace(&self, id: &str) -> Result<bool>;
    fn count_workspaces(&self) -> Result<i64>;
    fn total_storage_used(&self) -> Result<i64>;

    // Membership operations
    fn insert_membership(&self, membership: &Membership) -> Result<()>;
    fn get_membership(&self, user_id: &str, workspace_id: &str) -> Result<Option<Membership>>;
    fn count_memberships(&self, workspace_id: &str) -> Result<i32>;
    fn list_memberships(&self, workspace_id: &str) -> Result<Vec<Membership>>;
    fn list_user_memberships(&self, user_id: &str) -> Result<Vec<Membership>>;
    fn delete_membership(&self, user_id: &str, workspace_id: &str) -> Result<bool>;

    // Project operations
    fn create_project(&self, project: &Project) -> Result<()>;
    fn get_project(&self, id: &str) -> Result<Option<Project>>;
    fn list_projects(&self, workspace_id: &str) -> Result<Vec<Project>>;
    fn delete_project(&self, id: &str) -> Result<bool>;
    fn count_projects(&self) -> Result<i64>;

    // Session operations
    fn create_session(&self, session: &Session) -> Result<()>;
    fn get_session_by_lookup(&self, lookup: &str) -> Result<Option<Session>>;
    fn update_session_last_used(&self, id: &str) -> Result<()>;
    fn delete_session(&self, id: &str) -> Result<bool>;
}
