mod fs;

pub use fs::{FsObjectStore, ObjectInfo, ObjectMeta};

use std::io::ErrorKind;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid object path: {0}")]
    InvalidPath(String),
    #[error("corrupt object metadata at {0}")]
    CorruptMeta(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    fn from_io(e: std::io::Error) -> crate::error::Error {
        if e.kind() == ErrorKind::NotFound {
            crate::error::Error::NotFound
        } else {
            crate::error::Error::Storage(Self::Io(e))
        }
    }
}
