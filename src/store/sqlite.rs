use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

const WORKSPACE_COLUMNS: &str = "id, owner_user_id, plan_id, storage_used_bytes, cancelled_at, \
     delete_after, is_read_only, billing_customer_id, billing_subscription_id, created_at, updated_at";

fn workspace_from_row(row: &Row<'_>) -> rusqlite::Result<Workspace> {
    Ok(Workspace {
        id: row.get(0)?,
        owner_user_id: row.get(1)?,
        plan_id: row.get(2)?,
        storage_used_bytes: row.get(3)?,
        cancelled_at: row.get::<_, Option<String>>(4)?.map(|s| parse_datetime(&s)),
        delete_after: row.get::<_, Option<String>>(5)?.map(|s| parse_datetime(&s)),
        is_read_only: row.get(6)?,
        billing_customer_id: row.get(7)?,
        billing_subscription_id: row.get(8)?,
        created_at: parse_datetime(&row.get::<_, String>(9)?),
        updated_at: parse_datetime(&row.get::<_, String>(10)?),
    })
}

const USER_COLUMNS: &str =
    "id, provider, provider_user_id, primary_email, display_name, avatar_url, created_at, last_login_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        provider: row.get(1)?,
        provider_user_id: row.get(2)?,
        primary_email: row.get(3)?,
        display_name: row.get(4)?,
        avatar_url: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        last_login_at: row.get::<_, Option<String>>(7)?.map(|s| parse_datetime(&s)),
    })
}

fn membership_from_row(row: &Row<'_>) -> rusqlite::Result<Membership> {
    let role: String = row.get(2)?;
    Ok(Membership {
        user_id: row.get(0)?,
        workspace_id: row.get(1)?,
        role: Role::parse(&role).unwrap_or(Role::User),
        joined_at: parse_datetime(&row.get::<_, String>(3)?),
    })
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        updated_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // Plan operations

    fn create_plan(&self, plan: &Plan) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO plans (id, name, price_cents, storage_limit_bytes, max_members, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                plan.id,
                plan.name,
                plan.price_cents,
                plan.storage_limit_bytes,
                plan.max_members,
                format_datetime(&plan.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_plan(&self, id: &str) -> Result<Option<Plan>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, price_cents, storage_limit_bytes, max_members, created_at
             FROM plans WHERE id = ?1",
            params![id],
            |row| {
                Ok(Plan {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    price_cents: row.get(2)?,
                    storage_limit_bytes: row.get(3)?,
                    max_members: row.get(4)?,
                    created_at: parse_datetime(&row.get::<_, String>(5)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_plans(&self) -> Result<Vec<Plan>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, price_cents, storage_limit_bytes, max_members, created_at
             FROM plans ORDER BY price_cents",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(Plan {
                id: row.get(0)?,
                name: row.get(1)?,
                price_cents: row.get(2)?,
                storage_limit_bytes: row.get(3)?,
                max_members: row.get(4)?,
                created_at: parse_datetime(&row.get::<_, String>(5)?),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // User operations

    fn upsert_user(
        &self,
        provider: Provider,
        profile: &Profile,
        now: DateTime<Utc>,
    ) -> Result<User> {
        // One statement, so two concurrent first logins cannot both
        // observe "no such user": the second lands on the conflict arm.
        let conn = self.conn();
        let result = conn.query_row(
            &format!(
                "INSERT INTO users (id, provider, provider_user_id, primary_email, display_name, avatar_url, created_at, last_login_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                 ON CONFLICT (provider, provider_user_id) DO UPDATE SET
                    primary_email = excluded.primary_email,
                    display_name = COALESCE(excluded.display_name, users.display_name),
                    avatar_url = COALESCE(excluded.avatar_url, users.avatar_url),
                    last_login_at = excluded.last_login_at
                 RETURNING {USER_COLUMNS}"
            ),
            params![
                uuid::Uuid::new_v4().to_string(),
                provider.as_str(),
                profile.provider_user_id,
                profile.email,
                profile.display_name,
                profile.avatar_url,
                format_datetime(&now),
            ],
            user_from_row,
        );

        match result {
            Ok(user) => Ok(user),
            // The (provider, provider_user_id) pair lands on the conflict
            // arm above; the only constraint left to fire is the email
            // uniqueness, a different identity claiming a taken address.
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::AlreadyExists)
            }
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE primary_email = ?1"),
            params![email],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn count_users(&self) -> Result<i64> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }

    // Workspace operations

    fn create_workspace(&self, ws: &Workspace) -> Result<()> {
        self.conn().execute(
            &format!(
                "INSERT INTO workspaces ({WORKSPACE_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ),
            params![
                ws.id,
                ws.owner_user_id,
                ws.plan_id,
                ws.storage_used_bytes,
                ws.cancelled_at.as_ref().map(format_datetime),
                ws.delete_after.as_ref().map(format_datetime),
                ws.is_read_only,
                ws.billing_customer_id,
                ws.billing_subscription_id,
                format_datetime(&ws.created_at),
                format_datetime(&ws.updated_at),
            ],
        )?;
        Ok(())
    }

    fn get_workspace(&self, id: &str) -> Result<Option<Workspace>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {WORKSPACE_COLUMNS} FROM workspaces WHERE id = ?1"),
            params![id],
            workspace_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_workspace_by_subscription(&self, subscription_id: &str) -> Result<Option<Workspace>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {WORKSPACE_COLUMNS} FROM workspaces WHERE billing_subscription_id = ?1"
            ),
            params![subscription_id],
            workspace_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_workspace_ids(&self) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id FROM workspaces ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_purgeable_workspaces(&self, now: DateTime<Utc>) -> Result<Vec<Workspace>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {WORKSPACE_COLUMNS} FROM workspaces
             WHERE delete_after IS NOT NULL AND delete_after < ?1
             ORDER BY delete_after"
        ))?;

        let rows = stmt.query_map(params![format_datetime(&now)], workspace_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn set_storage_used(&self, id: &str, storage_used_bytes: i64) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE workspaces SET storage_used_bytes = ?1, updated_at = ?2 WHERE id = ?3",
            params![storage_used_bytes, format_datetime(&Utc::now()), id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn set_billing_customer(&self, id: &str, customer_id: &str) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE workspaces SET billing_customer_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![customer_id, format_datetime(&Utc::now()), id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn mark_cancelled(
        &self,
        id: &str,
        cancelled_at: DateTime<Utc>,
        delete_after: DateTime<Utc>,
    ) -> Result<bool> {
        // The `cancelled_at IS NULL` guard makes duplicate deliveries
        // of the same cancellation event no-ops.
        let rows = self.conn().execute(
            "UPDATE workspaces
             SET cancelled_at = ?1, delete_after = ?2, is_read_only = 1, updated_at = ?3
             WHERE id = ?4 AND cancelled_at IS NULL",
            params![
                format_datetime(&cancelled_at),
                format_datetime(&delete_after),
                format_datetime(&Utc::now()),
                id,
            ],
        )?;
        Ok(rows > 0)
    }

    fn reactivate(
        &self,
        id: &str,
        subscription_id: Option<&str>,
        plan_id: Option<&str>,
    ) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE workspaces
             SET cancelled_at = NULL, delete_after = NULL, is_read_only = 0,
                 billing_subscription_id = COALESCE(?1, billing_subscription_id),
                 plan_id = COALESCE(?2, plan_id),
                 updated_at = ?3
             WHERE id = ?4",
            params![subscription_id, plan_id, format_datetime(&Utc::now()), id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_workspace(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM workspaces WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn count_workspaces(&self) -> Result<i64> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM workspaces", [], |row| row.get(0))?;
        Ok(count)
    }

    fn total_storage_used(&self) -> Result<i64> {
        let conn = self.conn();
        let total: Option<i64> = conn
            .query_row("SELECT SUM(storage_used_bytes) FROM workspaces", [], |row| {
                row.get(0)
            })
            .optional()?
            .flatten();
        Ok(total.unwrap_or(0))
    }

    // Membership operations

    fn insert_membership(&self, membership: &Membership) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO memberships (user_id, workspace_id, role, joined_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                membership.user_id,
                membership.workspace_id,
                membership.role.as_str(),
                format_datetime(&membership.joined_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::AlreadyExists)
            }
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_membership(&self, user_id: &str, workspace_id: &str) -> Result<Option<Membership>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT user_id, workspace_id, role, joined_at
             FROM memberships WHERE user_id = ?1 AND workspace_id = ?2",
            params![user_id, workspace_id],
            membership_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn count_memberships(&self, workspace_id: &str) -> Result<i32> {
        let conn = self.conn();
        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM memberships WHERE workspace_id = ?1",
            params![workspace_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn list_memberships(&self, workspace_id: &str) -> Result<Vec<Membership>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT user_id, workspace_id, role, joined_at
             FROM memberships WHERE workspace_id = ?1 ORDER BY joined_at",
        )?;

        let rows = stmt.query_map(params![workspace_id], membership_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_user_memberships(&self, user_id: &str) -> Result<Vec<Membership>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT user_id, workspace_id, role, joined_at
             FROM memberships WHERE user_id = ?1 ORDER BY joined_at",
        )?;

        let rows = stmt.query_map(params![user_id], membership_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_membership(&self, user_id: &str, workspace_id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM memberships WHERE user_id = ?1 AND workspace_id = ?2",
            params![user_id, workspace_id],
        )?;
        Ok(rows > 0)
    }

    // Project operations

    fn create_project(&self, project: &Project) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO projects (id, workspace_id, name, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                project.id,
                project.workspace_id,
                project.name,
                project.description,
                format_datetime(&project.created_at),
                format_datetime(&project.updated_at),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::AlreadyExists)
            }
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_project(&self, id: &str) -> Result<Option<Project>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, workspace_id, name, description, created_at, updated_at
             FROM projects WHERE id = ?1",
            params![id],
            project_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_projects(&self, workspace_id: &str) -> Result<Vec<Project>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, workspace_id, name, description, created_at, updated_at
             FROM projects WHERE workspace_id = ?1 ORDER BY name",
        )?;

        let rows = stmt.query_map(params![workspace_id], project_from_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_project(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM projects WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn count_projects(&self) -> Result<i64> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM projects", [], |row| row.get(0))?;
        Ok(count)
    }

    // Session operations

    fn create_session(&self, session: &Session) -> Result<()> {
        self.conn().execute(
            "INSERT INTO sessions (id, token_hash, token_lookup, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.id,
                session.token_hash,
                session.token_lookup,
                session.user_id,
                format_datetime(&session.created_at),
                session.expires_at.as_ref().map(format_datetime),
            ],
        )?;
        Ok(())
    }

    fn get_session_by_lookup(&self, lookup: &str) -> Result<Option<Session>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, token_hash, token_lookup, user_id, created_at, expires_at, last_used_at
             FROM sessions WHERE token_lookup = ?1",
            params![lookup],
            |row| {
                Ok(Session {
                    id: row.get(0)?,
                    token_hash: row.get(1)?,
                    token_lookup: row.get(2)?,
                    user_id: row.get(3)?,
                    created_at: parse_datetime(&row.get::<_, String>(4)?),
                    expires_at: row.get::<_, Option<String>>(5)?.map(|s| parse_datetime(&s)),
                    last_used_at: row.get::<_, Option<String>>(6)?.map(|s| parse_datetime(&s)),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn update_session_last_used(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE sessions SET last_used_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    fn delete_session(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn test_store() -> (TempDir, SqliteStore) {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        (temp, store)
    }

    fn seed_plan(store: &SqliteStore, id: &str, limit: i64, max_members: i32) {
        store
            .create_plan(&Plan {
                id: id.to_string(),
                name: id.to_string(),
                price_cents: 0,
                storage_limit_bytes: limit,
                max_members,
                created_at: Utc::now(),
            })
            .unwrap();
    }

    fn seed_user(store: &SqliteStore, email: &str) -> User {
        store
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

    fn seed_workspace(store: &SqliteStore, id: &str, owner: &str, plan: &str) -> Workspace {
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
        store.create_workspace(&ws).unwrap();
        ws
    }

    #[test]
    fn test_initialize_creates_tables() {
        let (_temp, store) = test_store();

        let conn = store.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"plans".to_string()));
        assert!(tables.contains(&"users".to_string()));
        assert!(tables.contains(&"workspaces".to_string()));
        assert!(tables.contains(&"memberships".to_string()));
        assert!(tables.contains(&"projects".to_string()));
        assert!(tables.contains(&"sessions".to_string()));
    }

    #[test]
    fn test_upsert_user_insert_then_update() {
        let (_temp, store) = test_store();

        let t0 = Utc::now();
        let created = store
            .upsert_user(
                Provider::Google,
                &Profile {
                    provider_user_id: "108234".to_string(),
                    email: "ada@example.com".to_string(),
                    display_name: Some("Ada".to_string()),
                    avatar_url: None,
                },
                t0,
            )
            .unwrap();
        assert_eq!(created.primary_email, "ada@example.com");

        let t1 = t0 + Duration::minutes(5);
        let updated = store
            .upsert_user(
                Provider::Google,
                &Profile {
                    provider_user_id: "108234".to_string(),
                    email: "ada@example.com".to_string(),
                    display_name: None,
                    avatar_url: Some("https://img.example/a.png".to_string()),
                },
                t1,
            )
            .unwrap();

        // Same row, refreshed profile, bumped login timestamp.
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.display_name.as_deref(), Some("Ada"));
        assert_eq!(updated.avatar_url.as_deref(), Some("https://img.example/a.png"));
        assert!(updated.last_login_at.unwrap() > created.last_login_at.unwrap());
        assert_eq!(store.count_users().unwrap(), 1);
    }

    #[test]
    fn test_upsert_user_taken_email_rejected() {
        let (_temp, store) = test_store();
        seed_user(&store, "ada@example.com");

        // A different identity claiming the same address is refused,
        // not surfaced as a bare database error.
        let result = store.upsert_user(
            Provider::Google,
            &Profile {
                provider_user_id: "999".to_string(),
                email: "ada@example.com".to_string(),
                display_name: None,
                avatar_url: None,
            },
            Utc::now(),
        );
        assert!(matches!(result, Err(Error::AlreadyExists)));
        assert_eq!(store.count_users().unwrap(), 1);
    }

    #[test]
    fn test_mark_cancelled_is_guarded() {
        let (_temp, store) = test_store();
        seed_plan(&store, "free", 1024, 1);
        let user = seed_user(&store, "a@example.com");
        seed_workspace(&store, "ws-1", &user.id, "free");

        let t0 = Utc::now();
        let first = store
            .mark_cancelled("ws-1", t0, t0 + Duration::days(30))
            .unwrap();
        assert!(first);

        // A duplicate delivery must not re-stamp the grace window.
        let t1 = t0 + Duration::days(3);
        let second = store
            .mark_cancelled("ws-1", t1, t1 + Duration::days(30))
            .unwrap();
        assert!(!second);

        let ws = store.get_workspace("ws-1").unwrap().unwrap();
        assert!(ws.is_read_only);
        assert_eq!(
            ws.delete_after.unwrap().timestamp(),
            (t0 + Duration::days(30)).timestamp()
        );
    }

    #[test]
    fn test_reactivate_clears_lifecycle_fields() {
        let (_temp, store) = test_store();
        seed_plan(&store, "free", 1024, 1);
        seed_plan(&store, "haste_i", 4096, 5);
        let user = seed_user(&store, "a@example.com");
        seed_workspace(&store, "ws-1", &user.id, "free");

        let t0 = Utc::now();
        store
            .mark_cancelled("ws-1", t0, t0 + Duration::days(30))
            .unwrap();
        store
            .reactivate("ws-1", Some("sub_1"), Some("haste_i"))
            .unwrap();

        let ws = store.get_workspace("ws-1").unwrap().unwrap();
        assert!(!ws.is_read_only);
        assert!(ws.cancelled_at.is_none());
        assert!(ws.delete_after.is_none());
        assert_eq!(ws.plan_id, "haste_i");
        assert_eq!(ws.billing_subscription_id.as_deref(), Some("sub_1"));
    }

    #[test]
    fn test_list_purgeable_workspaces() {
        let (_temp, store) = test_store();
        seed_plan(&store, "free", 1024, 1);
        let user = seed_user(&store, "a@example.com");
        seed_workspace(&store, "ws-1", &user.id, "free");
        seed_workspace(&store, "ws-2", &user.id, "free");

        let past = Utc::now() - Duration::days(31);
        store
            .mark_cancelled("ws-1", past, past + Duration::days(30))
            .unwrap();

        let purgeable = store.list_purgeable_workspaces(Utc::now()).unwrap();
        assert_eq!(purgeable.len(), 1);
        assert_eq!(purgeable[0].id, "ws-1");
    }

    #[test]
    fn test_membership_duplicate_insert() {
        let (_temp, store) = test_store();
        seed_plan(&store, "free", 1024, 5);
        let user = seed_user(&store, "a@example.com");
        seed_workspace(&store, "ws-1", &user.id, "free");

        let membership = Membership {
            user_id: user.id.clone(),
            workspace_id: "ws-1".to_string(),
            role: Role::Admin,
            joined_at: Utc::now(),
        };
        store.insert_membership(&membership).unwrap();

        let result = store.insert_membership(&membership);
        assert!(matches!(result, Err(Error::AlreadyExists)));
        assert_eq!(store.count_memberships("ws-1").unwrap(), 1);
    }

    #[test]
    fn test_workspace_delete_cascades() {
        let (_temp, store) = test_store();
        seed_plan(&store, "free", 1024, 5);
        let user = seed_user(&store, "a@example.com");
        seed_workspace(&store, "ws-1", &user.id, "free");
        store
            .insert_membership(&Membership {
                user_id: user.id.clone(),
                workspace_id: "ws-1".to_string(),
                role: Role::Admin,
                joined_at: Utc::now(),
            })
            .unwrap();
        store
            .create_project(&Project {
                id: "proj-1".to_string(),
                workspace_id: "ws-1".to_string(),
                name: "api".to_string(),
                description: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .unwrap();

        assert!(store.delete_workspace("ws-1").unwrap());
        assert_eq!(store.count_memberships("ws-1").unwrap(), 0);
        assert!(store.list_projects("ws-1").unwrap().is_empty());
        // Second delete is a no-op.
        assert!(!store.delete_workspace("ws-1").unwrap());
    }
}
