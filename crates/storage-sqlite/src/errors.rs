//! Storage errors and their mapping onto the core error type.

use survey_sync_core::errors::{DatabaseError, Error};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to open database: {0}")]
    Open(String),

    #[error("Connection error: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Database writer is not running")]
    WriterClosed,
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Query(diesel::result::Error::NotFound) => {
                Error::Database(DatabaseError::NotFound("No rows returned".to_string()))
            }
            StorageError::Query(e) => Error::Database(DatabaseError::QueryFailed(e.to_string())),
            StorageError::Open(message) => {
                Error::Database(DatabaseError::ConnectionFailed(message))
            }
            StorageError::Connection(_) | StorageError::Pool(_) | StorageError::WriterClosed => {
                Error::Database(DatabaseError::ConnectionFailed(err.to_string()))
            }
            StorageError::Migration(_) => Error::Database(DatabaseError::Internal(err.to_string())),
        }
    }
}
