use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by blob stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store: read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store: write {path} failed after {attempts} attempt(s): {source}")]
    Write {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("store: invalid blob name {0:?}")]
    InvalidName(String),
}

/// Returned when a string cannot be used as an [`Identity`](crate::Identity).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("identity: empty")]
    Empty,

    #[error("identity: {0:?} is reserved")]
    Reserved(String),
}
