//! Whole-snapshot data movement between the local store and the remote store.
//!
//! Both directions run entry by entry. A failing entry is recorded and the
//! loop moves on; nothing here aborts early.

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::fs::{LocalStore, ObjectStore};
use crate::sync::manifest::{self, Manifest, ManifestCodec, DEVICE_INFO_FILE};
use crate::sync::metadata::SyncMetadata;
use crate::sync::snapshot::{is_reserved_key, FullExport, SnapshotSource, SyncSnapshot};

/// Outcome counters for one transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialResult {
    pub uploaded_files: usize,
    pub downloaded_files: usize,
    pub errors: Vec<String>,
}

impl PartialResult {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    fn record_error(&mut self, message: String) {
        warn!("{}", message);
        self.errors.push(message);
    }
}

/// A downloaded object, classified before it is applied locally.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteObject {
    /// A single snapshot entry, written verbatim under its logical name.
    RawFragment(Value),
    /// A full application export that replaces local state wholesale.
    FullExport(FullExport),
}

impl RemoteObject {
    /// Classify a parsed object. An object carrying a string `exportDate`
    /// next to an object `data` is a full export; anything else is a fragment.
    pub fn classify(value: Value) -> Self {
        let looks_like_export = value
            .as_object()
            .map(|obj| {
                obj.get("exportDate").is_some_and(Value::is_string)
                    && obj.get("data").is_some_and(Value::is_object)
            })
            .unwrap_or(false);

        if looks_like_export {
            match serde_json::from_value::<FullExport>(value.clone()) {
                Ok(export) => return RemoteObject::FullExport(export),
                Err(e) => debug!("Export-like object did not decode, treating as fragment: {}", e),
            }
        }
        RemoteObject::RawFragment(value)
    }
}

/// Diagnostic object describing the last device to upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub device_id: String,
    pub last_sync: i64,
    pub user_agent: String,
    pub timestamp: String,
}

impl DeviceInfo {
    pub fn current(device_id: &str) -> Self {
        let now = chrono::Utc::now();
        Self {
            device_id: device_id.to_string(),
            last_sync: now.timestamp_millis(),
            user_agent: format!(
                "snapsync/{} ({}; {})",
                env!("CARGO_PKG_VERSION"),
                std::env::consts::OS,
                std::env::consts::ARCH
            ),
            timestamp: now.to_rfc3339(),
        }
    }
}

/// Moves snapshot entries to and from the remote store.
pub struct Transfer {
    remote: Arc<dyn ObjectStore>,
    local: Arc<dyn LocalStore>,
    source: Arc<dyn SnapshotSource>,
    codec: ManifestCodec,
    default_export_file: String,
}

impl Transfer {
    pub fn new(
        remote: Arc<dyn ObjectStore>,
        local: Arc<dyn LocalStore>,
        source: Arc<dyn SnapshotSource>,
        codec: ManifestCodec,
        default_export_file: impl Into<String>,
    ) -> Self {
        Self {
            remote,
            local,
            source,
            codec,
            default_export_file: default_export_file.into(),
        }
    }

    /// Upload every snapshot entry as `{key}.json`, then the device-info object.
    pub async fn upload(&self, snapshot: &SyncSnapshot, device_id: &str) -> PartialResult {
        let mut result = PartialResult::default();

        for (key, value) in snapshot.sorted() {
            let entry = manifest::entry_for(key);
            let remote_key = self.codec.remote_key(&entry);

            let bytes = match serde_json::to_vec_pretty(value) {
                Ok(bytes) => bytes,
                Err(e) => {
                    result.record_error(format!("Failed to serialize {}: {}", entry, e));
                    continue;
                }
            };

            match self.remote.put_object(&remote_key, bytes).await {
                Ok(()) => {
                    debug!("Uploaded {}", self.remote.display_path(&remote_key));
                    result.uploaded_files += 1;
                }
                Err(e) => result.record_error(format!("Failed to upload {}: {:#}", entry, e)),
            }
        }

        self.write_device_info(device_id).await;
        result
    }

    /// Non-critical: failures are logged and never reach the result.
    async fn write_device_info(&self, device_id: &str) {
        let key = self.codec.remote_key(DEVICE_INFO_FILE);
        let outcome = match serde_json::to_vec_pretty(&DeviceInfo::current(device_id)) {
            Ok(bytes) => self.remote.put_object(&key, bytes).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = outcome {
            warn!("Failed to write device info {}: {:#}", key, e);
        }
    }

    /// Download the remote snapshot into local storage.
    ///
    /// Returns the entries actually applied alongside the counters.
    pub async fn download(&self, remote_meta: Option<&SyncMetadata>) -> (Manifest, PartialResult) {
        let mut result = PartialResult::default();
        let mut written = Manifest::new();

        let targets = self.download_targets(remote_meta, &mut result).await;
        info!("Downloading {} remote entries", targets.len());

        for entry in &targets {
            match self.download_entry(entry).await {
                Ok(true) => {
                    written.insert(entry.clone());
                    result.downloaded_files += 1;
                }
                Ok(false) => {}
                Err(e) => result.record_error(format!("Failed to download {}: {:#}", entry, e)),
            }
        }

        (written, result)
    }

    /// Remote manifest if it names anything, else a listing under the prefix,
    /// else the default export file.
    async fn download_targets(
        &self,
        remote_meta: Option<&SyncMetadata>,
        result: &mut PartialResult,
    ) -> Manifest {
        // Declared entries are already logical names; only listed keys carry the prefix.
        if let Some(meta) = remote_meta.filter(|m| !m.files.is_empty()) {
            return meta
                .files
                .iter()
                .map(|entry| entry.trim_start_matches('/'))
                .filter(|entry| !entry.is_empty())
                .map(str::to_string)
                .collect();
        }

        let mut targets: Manifest = match self.remote.list_objects(self.codec.prefix()).await {
            Ok(objects) => self
                .codec
                .collect(objects.iter().map(|o| o.key.as_str()))
                .into_iter()
                .filter(|entry| !manifest::is_bookkeeping(entry))
                .collect(),
            Err(e) => {
                result.record_error(format!("Failed to list remote objects: {:#}", e));
                Manifest::new()
            }
        };

        if targets.is_empty() {
            debug!("No remote entries found, trying {}", self.default_export_file);
            targets.insert(self.default_export_file.clone());
        }
        targets
    }

    /// Fetch and apply one entry. `Ok(false)` means the object does not exist.
    async fn download_entry(&self, entry: &str) -> Result<bool> {
        let remote_key = self.codec.remote_key(entry);
        let Some(bytes) = self.remote.get_object(&remote_key).await? else {
            debug!("Skipping {}: not found", self.remote.display_path(&remote_key));
            return Ok(false);
        };

        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| anyhow::anyhow!("invalid JSON: {}", e))?;

        match RemoteObject::classify(value) {
            RemoteObject::FullExport(export) => {
                let count = self.source.import_full_export(&export).await?;
                info!(
                    "Imported full export {} ({} keys, exported {})",
                    entry, count, export.export_date
                );
            }
            RemoteObject::RawFragment(_) => {
                let name = manifest::logical_name(entry);
                if is_reserved_key(name) {
                    warn!("Skipping {}: name is reserved for sync bookkeeping", entry);
                    return Ok(false);
                }
                let raw = String::from_utf8_lossy(&bytes).into_owned();
                self.local.set(name, raw).await?;
            }
        }
        Ok(true)
    }
}
