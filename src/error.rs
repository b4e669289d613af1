use std::io;

use flipadelphia_types::{ParseFeatureNameError, ParseScopeError};

/// Represents all ways a method can fail within flipadelphia.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("io error {0}")]
    Io(#[from] io::Error),

    #[error("storage error {0}")]
    Storage(#[from] redb::Error),

    #[error("redis error {0}")]
    Redis(#[from] redis::RedisError),

    #[error("redis pool error {0}")]
    RedisPool(#[from] r2d2::Error),

    #[error("json error {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid scope: {0}")]
    Scope(#[from] ParseScopeError),

    #[error("invalid feature name: {0}")]
    Feature(#[from] ParseFeatureNameError),

    #[error("http request error {0}")]
    Request(#[from] reqwest::Error),

    #[error("auth request failed: {0}")]
    Auth(String),

    #[error("{0} is not supported by this persistence store")]
    Unsupported(&'static str),

    #[error("configuration error: {0}")]
    Config(String),
}

impl From<redb::DatabaseError> for Error {
    fn from(err: redb::DatabaseError) -> Self {
        Error::Storage(err.into())
    }
}

impl From<redb::TransactionError> for Error {
    fn from(err: redb::TransactionError) -> Self {
        Error::Storage(err.into())
    }
}

impl From<redb::TableError> for Error {
    fn from(err: redb::TableError) -> Self {
        Error::Storage(err.into())
    }
}

impl From<redb::StorageError> for Error {
    fn from(err: redb::StorageError) -> Self {
        Error::Storage(err.into())
    }
}

impl From<redb::CommitError> for Error {
    fn from(err: redb::CommitError) -> Self {
        Error::Storage(err.into())
    }
}
