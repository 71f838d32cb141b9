mod middleware;
mod token;

pub use middleware::{AuthError, RequireAdmin, RequireUser};
pub use token::{TokenGenerator, parse_token};

use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Session, User};

/// Issues a session for a resolved user. Returns the raw bearer token;
/// only its argon2id hash is stored.
pub fn issue_session(store: &dyn Store, generator: &TokenGenerator, user: &User) -> Result<String> {
    let (raw_token, lookup, hash) = generator.generate()?;

    store.create_session(&Session {
        id: Uuid::new_v4().to_string(),
        token_hash: hash,
        token_lookup: lookup,
        user_id: user.id.clone(),
        created_at: Utc::now(),
        expires_at: None,
        last_used_at: None,
    })?;

    Ok(raw_token)
}

/// Validates a raw bearer token: lookup by prefix, argon2 verify,
/// expiry check. Bumps `last_used_at` on success.
pub fn validate_session(
    store: &dyn Store,
    generator: &TokenGenerator,
    raw_token: &str,
) -> Result<Session> {
    let (lookup, _secret) = parse_token(raw_token)?;

    let session = store
        .get_session_by_lookup(&lookup)?
        .ok_or(Error::Unauthorized)?;

    if !generator.verify(raw_token, &session.token_hash)? {
        return Err(Error::Unauthorized);
    }

    if let Some(expires_at) = session.expires_at
        && expires_at < Utc::now()
    {
        return Err(Error::TokenExpired);
    }

    store.update_session_last_used(&session.id)?;
    Ok(session)
}
