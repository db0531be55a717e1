// Library module for snapsync
// Re-exports modules for use in integration tests and the CLI

pub mod config;
pub mod error;
pub mod fs;
pub mod sync;

pub use config::SyncConfig;
pub use error::SyncError;
