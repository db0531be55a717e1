//! Sync bookkeeping records and where they live.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::fs::{LocalStore, ObjectStore};
use crate::sync::manifest::{Manifest, ManifestCodec, METADATA_FILE};

/// Local store key holding the local metadata record.
pub const LOCAL_METADATA_KEY: &str = "sync-metadata";

/// Sync protocol version written into every record.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Bookkeeping describing the last successful sync from one side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetadata {
    /// Epoch millis when this record was written.
    pub last_sync_time: i64,
    pub version: String,
    pub device_id: String,
    #[serde(default)]
    pub files: Manifest,
    pub data_hash: String,
}

impl SyncMetadata {
    /// New record stamped with the current time.
    pub fn new(device_id: impl Into<String>, files: Manifest, data_hash: impl Into<String>) -> Self {
        Self {
            last_sync_time: chrono::Utc::now().timestamp_millis(),
            version: PROTOCOL_VERSION.to_string(),
            device_id: device_id.into(),
            files,
            data_hash: data_hash.into(),
        }
    }

    pub fn with_sync_time(mut self, millis: i64) -> Self {
        self.last_sync_time = millis;
        self
    }
}

/// Reads and writes the local and remote metadata records.
///
/// The two records are independent; nothing here keeps them consistent.
/// A record that exists but cannot be parsed is reported as absent.
pub struct MetadataStore {
    remote: Arc<dyn ObjectStore>,
    local: Arc<dyn LocalStore>,
    codec: ManifestCodec,
}

impl MetadataStore {
    pub fn new(remote: Arc<dyn ObjectStore>, local: Arc<dyn LocalStore>, codec: ManifestCodec) -> Self {
        Self { remote, local, codec }
    }

    fn remote_key(&self) -> String {
        self.codec.remote_key(METADATA_FILE)
    }

    pub async fn load_local(&self) -> Result<Option<SyncMetadata>> {
        let Some(raw) = self
            .local
            .get(LOCAL_METADATA_KEY)
            .await
            .context("Failed to read local sync metadata")?
        else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(meta) => Ok(Some(meta)),
            Err(e) => {
                tracing::warn!("Ignoring unreadable local sync metadata: {}", e);
                Ok(None)
            }
        }
    }

    pub async fn save_local(&self, meta: &SyncMetadata) -> Result<()> {
        let raw = serde_json::to_string(meta)?;
        self.local
            .set(LOCAL_METADATA_KEY, raw)
            .await
            .context("Failed to write local sync metadata")
    }

    pub async fn load_remote(&self) -> Result<Option<SyncMetadata>> {
        let key = self.remote_key();
        let Some(bytes) = self
            .remote
            .get_object(&key)
            .await
            .with_context(|| format!("Failed to fetch remote sync metadata {}", key))?
        else {
            return Ok(None);
        };

        match serde_json::from_slice(&bytes) {
            Ok(meta) => Ok(Some(meta)),
            Err(e) => {
                tracing::warn!("Ignoring unreadable remote sync metadata {}: {}", key, e);
                Ok(None)
            }
        }
    }

    pub async fn save_remote(&self, meta: &SyncMetadata) -> Result<()> {
        let key = self.remote_key();
        let bytes = serde_json::to_vec_pretty(meta)?;
        self.remote
            .put_object(&key, bytes)
            .await
            .with_context(|| format!("Failed to write remote sync metadata {}", key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{MemoryStore, OpendalStore};
    use serde_json::json;

    fn store(prefix: &str) -> (MetadataStore, Arc<OpendalStore>, Arc<MemoryStore>) {
        let remote = Arc::new(OpendalStore::memory().unwrap());
        let local = Arc::new(MemoryStore::new());
        let store = MetadataStore::new(remote.clone(), local.clone(), ManifestCodec::new(prefix));
        (store, remote, local)
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let meta = SyncMetadata::new("dev", Manifest::from(["b.json".to_string(), "a.json".to_string()]), "h")
            .with_sync_time(42);
        let value = serde_json::to_value(&meta).unwrap();

        assert_eq!(
            value,
            json!({
                "lastSyncTime": 42,
                "version": "1.0",
                "deviceId": "dev",
                "files": ["a.json", "b.json"],
                "dataHash": "h"
            })
        );
    }

    #[tokio::test]
    async fn test_local_and_remote_are_independent() {
        let (store, remote, _local) = store("coffee/");
        assert!(store.load_local().await.unwrap().is_none());
        assert!(store.load_remote().await.unwrap().is_none());

        let meta = SyncMetadata::new("dev", Manifest::new(), "h1");
        store.save_remote(&meta).await.unwrap();

        assert_eq!(store.load_remote().await.unwrap(), Some(meta));
        assert!(store.load_local().await.unwrap().is_none());
        assert!(remote
            .get_object("coffee/sync-metadata.json")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_corrupt_local_metadata_reads_as_absent() {
        let (store, _remote, local) = store("");
        local.set(LOCAL_METADATA_KEY, "{oops".to_string()).await.unwrap();
        assert!(store.load_local().await.unwrap().is_none());
    }
}
