use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("storage quota exceeded: would use {would_use} of {limit} bytes")]
    QuotaExceeded { would_use: i64, limit: i64 },

    #[error("team size limit exceeded: plan allows {limit} members")]
    TeamLimitExceeded { limit: i32 },

    #[error("write conflict: expected generation {expected}, current is {current}")]
    Conflict { expected: u64, current: u64 },

    #[error("workspace is read-only (cancelled subscription)")]
    ReadOnlyWorkspace,

    #[error("no workspace matches billing identifier '{0}'")]
    UnknownWorkspace(String),

    #[error("export grace period has expired")]
    GraceExpired,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("invalid token format")]
    InvalidTokenFormat,

    #[error("token expired")]
    TokenExpired,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("object storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

pub type Result<T> = std::result::Result<T, Error>;
