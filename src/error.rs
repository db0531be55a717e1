//! Error types for the sync engine.
//!
//! Per-entry transfer failures are never raised through these types; they are
//! collected as strings in the sync result. `SyncError` covers the failures
//! that stop a sync (or a coordinator) from starting at all.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// The remote store could not be reached during initialization.
    #[error("Cannot reach remote store: {0}")]
    Connection(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Local or remote storage failure outside of a per-entry transfer.
    #[error("Storage error: {0}")]
    Store(String),

    #[error("Sync already in progress")]
    AlreadyInProgress,
}

impl SyncError {
    /// Wrap an `anyhow` error from a storage backend, keeping its context chain.
    pub fn store(err: anyhow::Error) -> Self {
        Self::Store(format!("{:#}", err))
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
