pub mod backend;
pub mod local;
pub mod s3;
pub mod types;

pub use backend::{BackendType, LocalStore, ObjectStore, S3Provider};
pub use local::{JsonFileStore, MemoryStore};
pub use s3::OpendalStore;
pub use types::*;
