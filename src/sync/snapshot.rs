//! Local application snapshot and the source that produces it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::fs::LocalStore;
use crate::sync::identity::DEVICE_ID_KEY;
use crate::sync::metadata::LOCAL_METADATA_KEY;

/// Store keys owned by the sync engine. They never appear in a snapshot and
/// are never overwritten by downloaded data.
pub const RESERVED_KEYS: &[&str] = &[LOCAL_METADATA_KEY, DEVICE_ID_KEY];

pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

/// The full exportable application state: logical name -> opaque JSON value.
///
/// Ordering of the underlying map is unspecified; anything that needs a
/// stable order (hashing, upload) sorts explicitly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncSnapshot {
    entries: HashMap<String, Value>,
}

impl SyncSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> &HashMap<String, Value> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by key.
    pub fn sorted(&self) -> Vec<(&String, &Value)> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    /// Canonical content hash of this snapshot.
    pub fn content_hash(&self) -> String {
        crate::sync::hash::hash_snapshot(&self.entries)
    }
}

impl FromIterator<(String, Value)> for SyncSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// A complete application export: every key of the application state wrapped
/// in a dated envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullExport {
    pub export_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub data: Map<String, Value>,
}

/// Produces snapshots of local state and applies full exports to it.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Flatten the current local state into a fresh snapshot.
    async fn export_snapshot(&self) -> Result<SyncSnapshot>;

    /// Write every key of a full export into local state, overwriting existing
    /// values. Keys absent from the export are left alone.
    /// Returns the number of keys written.
    async fn import_full_export(&self, export: &FullExport) -> Result<usize>;
}

/// Snapshot source reading application state straight out of a [`LocalStore`].
///
/// Every non-reserved key is part of the snapshot. Values that are not valid
/// JSON are carried as JSON strings.
pub struct StoreSnapshotSource {
    store: Arc<dyn LocalStore>,
}

impl StoreSnapshotSource {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SnapshotSource for StoreSnapshotSource {
    async fn export_snapshot(&self) -> Result<SyncSnapshot> {
        let mut snapshot = SyncSnapshot::new();

        for key in self.store.keys().await.context("Failed to list local keys")? {
            if is_reserved_key(&key) {
                continue;
            }
            let Some(raw) = self.store.get(&key).await? else {
                continue;
            };
            let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            snapshot.insert(key, value);
        }

        Ok(snapshot)
    }

    async fn import_full_export(&self, export: &FullExport) -> Result<usize> {
        let mut written = 0;
        for (key, value) in &export.data {
            if is_reserved_key(key) {
                tracing::warn!("Ignoring reserved key {} in full export", key);
                continue;
            }
            let raw = serde_json::to_string(value)?;
            self.store
                .set(key, raw)
                .await
                .with_context(|| format!("Failed to import {}", key))?;
            written += 1;
        }
        Ok(written)
    }
}
