use std::sync::Arc;

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;
use sha2::{Digest, Sha256};

use super::validate_session;
use crate::error::Error;
use crate::server::AppState;
use crate::types::{Session, User};

/// Header carrying the shared secret for scheduler-triggered admin
/// endpoints (jobs, stats).
pub const ADMIN_SECRET_HEADER: &str = "x-admin-secret";

/// Extractor that requires a valid session token
pub struct RequireUser {
    pub session: Session,
    pub user: User,
}

/// Extractor that requires the admin shared secret
pub struct RequireAdmin;

#[derive(Debug)]
pub enum AuthError {
    MissingAuth,
    InvalidScheme,
    InvalidToken,
    TokenExpired,
    NotAdmin,
    InternalError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingAuth => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AuthError::InvalidScheme => (StatusCode::UNAUTHORIZED, "Invalid authorization scheme"),
            AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid token"),
            AuthError::TokenExpired => (StatusCode::UNAUTHORIZED, "Token expired"),
            AuthError::NotAdmin => (StatusCode::FORBIDDEN, "Admin access required"),
            AuthError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = json!({ "data": null, "error": message });
        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                "WWW-Authenticate",
                "Bearer realm=\"beacon\"".parse().unwrap(),
            );
        }

        response
    }
}

impl FromRequestParts<Arc<AppState>> for RequireUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let raw_token = bearer_token(parts)?.ok_or(AuthError::MissingAuth)?;

        let session =
            validate_session(state.core.store(), &state.tokens, &raw_token).map_err(
                |e| match e {
                    Error::InvalidTokenFormat => AuthError::InvalidToken,
                    Error::Unauthorized => AuthError::InvalidToken,
                    Error::TokenExpired => AuthError::TokenExpired,
                    _ => AuthError::InternalError,
                },
            )?;

        let user = state
            .core
            .store()
            .get_user(&session.user_id)
            .map_err(|_| AuthError::InternalError)?
            .ok_or(AuthError::InvalidToken)?;

        Ok(RequireUser { session, user })
    }
}

impl FromRequestParts<Arc<AppState>> for RequireAdmin {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get(ADMIN_SECRET_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or(AuthError::MissingAuth)?;

        // Digest comparison keeps the check constant-time.
        let provided_digest = Sha256::digest(provided.as_bytes());
        let expected_digest = Sha256::digest(state.admin_secret.as_bytes());
        if provided_digest != expected_digest {
            return Err(AuthError::NotAdmin);
        }

        Ok(RequireAdmin)
    }
}

fn bearer_token(parts: &Parts) -> Result<Option<String>, AuthError> {
    let Some(header) = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    else {
        return Ok(None);
    };

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidScheme)?;
    Ok(Some(token.to_string()))
}
