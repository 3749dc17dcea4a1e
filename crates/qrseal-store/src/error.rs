//! Registry errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored row could not be turned back into a record.
    #[error("corrupt registry row: {0}")]
    InvalidData(String),

    #[error("schema migration failed: {0}")]
    Migration(String),

    /// A writer panicked while holding the registry lock.
    #[error("registry lock poisoned: {0}")]
    LockPoisoned(String),

    /// The blocking worker running a database call failed.
    #[error("blocking task failed: {0}")]
    Task(String),

    #[error("registry I/O: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
