use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::types::Workspace;

/// Lifecycle state of a workspace row. The third state, purged, has no
/// row at all: the purge job deletes the workspace outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Active,
    CancelledGrace,
}

impl Lifecycle {
    #[must_use]
    pub fn of(ws: &Workspace) -> Self {
        if ws.cancelled_at.is_some() {
            Lifecycle::CancelledGrace
        } else {
            Lifecycle::Active
        }
    }
}

/// Mutations (file writes, deletes, invites, project changes) are
/// refused the moment the workspace goes read-only.
pub(crate) fn ensure_writable(ws: &Workspace) -> Result<()> {
    if ws.is_read_only {
        return Err(Error::ReadOnlyWorkspace);
    }
    Ok(())
}

/// Export stays available for the whole grace window and no longer.
pub(crate) fn ensure_exportable(ws: &Workspace, now: DateTime<Utc>) -> Result<()> {
    match ws.delete_after {
        Some(delete_after) if now > delete_after => Err(Error::GraceExpired),
        _ => Ok(()),
    }
}
