use anyhow::{Context, Result};
use async_trait::async_trait;
use opendal::{services::Memory, services::S3, ErrorKind, Operator};

use crate::config::SyncConfig;
use crate::fs::backend::{BackendType, ObjectStore};
use crate::fs::types::ObjectEntry;

/// S3-compatible object store using OpenDAL.
///
/// Also backs the in-memory store used for dry runs and tests, so both go
/// through the same operator code path.
pub struct OpendalStore {
    operator: Operator,
    backend: BackendType,
    bucket: String,
}

impl OpendalStore {
    /// Create a store from a validated sync configuration.
    ///
    /// Without explicit credentials OpenDAL falls back to the standard AWS
    /// credential chain (environment, shared credentials file, instance profile).
    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        let mut builder = S3::default()
            .bucket(&config.bucket)
            .region(&config.region);

        if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            builder = builder
                .access_key_id(access_key)
                .secret_access_key(secret_key);
        }

        if let Some(endpoint) = config.resolved_endpoint() {
            builder = builder.endpoint(&endpoint);
        }

        let operator = Operator::new(builder)
            .context("Failed to build S3 operator")?
            .finish();

        Ok(Self {
            operator,
            backend: BackendType::S3 {
                bucket: config.bucket.clone(),
                region: config.region.clone(),
                provider: config.provider.clone(),
            },
            bucket: config.bucket.clone(),
        })
    }

    /// Create a store backed by process memory.
    pub fn memory() -> Result<Self> {
        let operator = Operator::new(Memory::default())
            .context("Failed to build memory operator")?
            .finish();

        Ok(Self {
            operator,
            backend: BackendType::Memory,
            bucket: "memory".to_string(),
        })
    }
}

#[async_trait]
impl ObjectStore for OpendalStore {
    async fn put_object(&self, key: &str, content: Vec<u8>) -> Result<()> {
        let key = key.trim_start_matches('/');
        self.operator
            .write(key, content)
            .await
            .with_context(|| format!("Failed to write {}", self.display_path(key)))?;
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let key = key.trim_start_matches('/');
        match self.operator.read(key).await {
            Ok(content) => Ok(Some(content.to_vec())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", self.display_path(key))),
        }
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectEntry>> {
        let prefix = prefix.trim_matches('/');
        let path = if prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", prefix)
        };

        let entries = match self.operator.list_with(&path).recursive(true).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to list {}", self.display_path(&path)))
            }
        };

        let mut result: Vec<ObjectEntry> = entries
            .into_iter()
            .filter(|entry| entry.metadata().mode().is_file())
            .map(|entry| ObjectEntry::new(entry.path()))
            .collect();

        result.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(result)
    }

    async fn test_connection(&self) -> Result<()> {
        self.operator
            .check()
            .await
            .with_context(|| format!("Connection check failed for {}", self.display_path("")))
    }

    fn backend_type(&self) -> BackendType {
        self.backend.clone()
    }

    fn display_path(&self, key: &str) -> String {
        match self.backend {
            BackendType::S3 { .. } => format!("s3://{}/{}", self.bucket, key.trim_start_matches('/')),
            BackendType::Memory => format!("memory://{}", key.trim_start_matches('/')),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_put_get_roundtrip() {
        let store = OpendalStore::memory().unwrap();
        store.put_object("data/beans.json", b"[1,2]".to_vec()).await.unwrap();

        let content = store.get_object("data/beans.json").await.unwrap();
        assert_eq!(content.as_deref(), Some(&b"[1,2]"[..]));
    }

    #[tokio::test]
    async fn test_missing_object_is_none() {
        let store = OpendalStore::memory().unwrap();
        assert!(store.get_object("nope.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_objects_under_prefix() {
        let store = OpendalStore::memory().unwrap();
        store.put_object("data/a.json", b"1".to_vec()).await.unwrap();
        store.put_object("data/b.json", b"2".to_vec()).await.unwrap();
        store.put_object("other/c.json", b"3".to_vec()).await.unwrap();

        let keys: Vec<String> = store
            .list_objects("data")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec!["data/a.json", "data/b.json"]);
    }

    #[test]
    fn test_display_path() {
        let store = OpendalStore::memory().unwrap();
        assert_eq!(store.display_path("/x.json"), "memory://x.json");
        assert_eq!(store.backend_type(), BackendType::Memory);
    }
}
