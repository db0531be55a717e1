// Shared test doubles for the sync integration tests.
#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use snapsync::fs::{BackendType, LocalStore, MemoryStore, ObjectEntry, ObjectStore, OpendalStore};
use snapsync::sync::{StoreSnapshotSource, SyncCoordinator};
use snapsync::SyncConfig;

/// In-memory object store with failure injection and an optional gate that
/// parks the first `get_object` until released.
pub struct TestStore {
    inner: OpendalStore,
    fail_puts: Vec<String>,
    fail_connection: bool,
    gate_armed: AtomicBool,
    pub entered: Notify,
    pub release: Notify,
}

impl TestStore {
    pub fn new() -> Self {
        Self {
            inner: OpendalStore::memory().unwrap(),
            fail_puts: Vec::new(),
            fail_connection: false,
            gate_armed: AtomicBool::new(false),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    /// Fail every put whose key ends with one of `names`.
    pub fn failing_puts(mut self, names: &[&str]) -> Self {
        self.fail_puts = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    pub fn gated(self) -> Self {
        self.gate_armed.store(true, Ordering::SeqCst);
        self
    }

    pub async fn get_json(&self, key: &str) -> Option<Value> {
        self.inner
            .get_object(key)
            .await
            .unwrap()
            .map(|bytes| serde_json::from_slice(&bytes).unwrap())
    }

    pub async fn put_raw(&self, key: &str, content: &str) {
        self.inner
            .put_object(key, content.as_bytes().to_vec())
            .await
            .unwrap();
    }
}

#[async_trait]
impl ObjectStore for TestStore {
    async fn put_object(&self, key: &str, content: Vec<u8>) -> Result<()> {
        if self.fail_puts.iter().any(|name| key.ends_with(name.as_str())) {
            bail!("injected put failure for {}", key);
        }
        self.inner.put_object(key, content).await
    }

    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if self.gate_armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.get_object(key).await
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectEntry>> {
        self.inner.list_objects(prefix).await
    }

    async fn test_connection(&self) -> Result<()> {
        if self.fail_connection {
            bail!("connection refused");
        }
        self.inner.test_connection().await
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Memory
    }
}

pub fn config(prefix: &str) -> SyncConfig {
    SyncConfig {
        bucket: "test-bucket".to_string(),
        prefix: prefix.to_string(),
        ..SyncConfig::default()
    }
}

/// Local store seeded with JSON values.
pub fn local_with(entries: &[(&str, Value)]) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_entries(
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::to_string(v).unwrap())),
    ))
}

pub fn coordinator(
    remote: Arc<TestStore>,
    local: Arc<MemoryStore>,
    prefix: &str,
) -> SyncCoordinator {
    let source = Arc::new(StoreSnapshotSource::new(local.clone()));
    SyncCoordinator::new(remote, local, source, &config(prefix))
}

pub async fn local_json(local: &dyn LocalStore, key: &str) -> Option<Value> {
    local
        .get(key)
        .await
        .unwrap()
        .map(|raw| serde_json::from_str(&raw).unwrap())
}
