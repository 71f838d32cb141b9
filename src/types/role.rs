use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Role within a workspace. Stored uppercase, matching the values the
/// membership table carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Mod,
    User,
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Mod => "MOD",
            Role::User => "USER",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "MOD" => Ok(Role::Mod),
            "USER" => Ok(Role::User),
            other => Err(Error::BadRequest(format!("invalid role: {other}"))),
        }
    }

    /// ADMIN > MOD > USER.
    #[must_use]
    pub fn at_least(&self, required: Role) -> bool {
        let rank = |r: &Role| match r {
            Role::Admin => 3,
            Role::Mod => 2,
            Role::User => 1,
        };
        rank(self) >= rank(&required)
    }
}
