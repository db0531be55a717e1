//! Sync coordinator.
//!
//! Sequences hashing, metadata loading, direction arbitration, transfer and
//! metadata persistence for one sync at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::fs::{LocalStore, ObjectStore};
use crate::sync::conflict::{ConflictResolver, Decision, Direction};
use crate::sync::identity::DeviceIdentity;
use crate::sync::manifest::{self, ManifestCodec};
use crate::sync::metadata::{MetadataStore, SyncMetadata};
use crate::sync::snapshot::SnapshotSource;
use crate::sync::transfer::{PartialResult, Transfer};

/// Coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Idle,
    Running,
}

/// How a sync invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Transfer and metadata writes all succeeded.
    Completed,
    /// The sync ran to the end but some entries or writes failed.
    Partial,
    /// The sync stopped before transferring anything.
    Failed,
    /// Rejected because another sync was running; nothing was touched.
    AlreadyInProgress,
}

/// Result of a sync invocation, ready to show to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResult {
    pub outcome: SyncOutcome,
    pub success: bool,
    pub message: String,
    /// Direction taken; `None` when the sync never got that far.
    pub direction: Option<Direction>,
    pub uploaded_files: usize,
    pub downloaded_files: usize,
    pub errors: Vec<String>,
}

impl SyncResult {
    /// Rejection for a sync started while another is running.
    pub fn already_in_progress() -> Self {
        Self {
            outcome: SyncOutcome::AlreadyInProgress,
            success: false,
            message: SyncError::AlreadyInProgress.to_string(),
            direction: None,
            uploaded_files: 0,
            downloaded_files: 0,
            errors: Vec::new(),
        }
    }

    /// A sync that failed outright.
    pub fn failed(err: &SyncError) -> Self {
        Self {
            outcome: SyncOutcome::Failed,
            success: false,
            message: format!("Sync failed: {}", err),
            direction: None,
            uploaded_files: 0,
            downloaded_files: 0,
            errors: vec![err.to_string()],
        }
    }

    fn from_partial(direction: Direction, partial: PartialResult) -> Self {
        let (verb, count) = match direction {
            Direction::Upload => ("uploaded", partial.uploaded_files),
            Direction::Download => ("downloaded", partial.downloaded_files),
        };
        let success = partial.is_success();
        let message = if success {
            format!("Sync complete: {} {} files", verb, count)
        } else {
            format!(
                "Partial success: {} {} files with {} errors",
                verb,
                count,
                partial.errors.len()
            )
        };

        Self {
            outcome: if success {
                SyncOutcome::Completed
            } else {
                SyncOutcome::Partial
            },
            success,
            message,
            direction: Some(direction),
            uploaded_files: partial.uploaded_files,
            downloaded_files: partial.downloaded_files,
            errors: partial.errors,
        }
    }

    pub fn is_already_in_progress(&self) -> bool {
        self.outcome == SyncOutcome::AlreadyInProgress
    }
}

/// Read-only view of the sync state, for status displays.
#[derive(Debug, Clone)]
pub struct SyncStatusReport {
    pub state: SyncState,
    pub local: Option<SyncMetadata>,
    pub remote: Option<SyncMetadata>,
    pub current_hash: String,
    /// What a sync started now would do.
    pub pending: Decision,
}

/// Clears the in-progress flag on every exit path.
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Top-level orchestrator. At most one sync runs per instance.
pub struct SyncCoordinator {
    source: Arc<dyn SnapshotSource>,
    metadata: MetadataStore,
    transfer: Transfer,
    identity: DeviceIdentity,
    in_progress: AtomicBool,
}

impl SyncCoordinator {
    pub fn new(
        remote: Arc<dyn ObjectStore>,
        local: Arc<dyn LocalStore>,
        source: Arc<dyn SnapshotSource>,
        config: &SyncConfig,
    ) -> Self {
        let codec = ManifestCodec::new(config.prefix.clone());
        Self {
            metadata: MetadataStore::new(remote.clone(), local.clone(), codec.clone()),
            transfer: Transfer::new(
                remote,
                local.clone(),
                source.clone(),
                codec,
                config.default_export_file.clone(),
            ),
            identity: DeviceIdentity::new(local),
            source,
            in_progress: AtomicBool::new(false),
        }
    }

    /// Create a coordinator after confirming the remote store is reachable.
    pub async fn connect(
        remote: Arc<dyn ObjectStore>,
        local: Arc<dyn LocalStore>,
        source: Arc<dyn SnapshotSource>,
        config: &SyncConfig,
    ) -> Result<Self> {
        remote
            .test_connection()
            .await
            .map_err(|e| SyncError::Connection(format!("{:#}", e)))?;
        info!("Connected to {}", remote.display_path(&config.prefix));
        Ok(Self::new(remote, local, source, config))
    }

    pub fn state(&self) -> SyncState {
        if self.in_progress.load(Ordering::Acquire) {
            SyncState::Running
        } else {
            SyncState::Idle
        }
    }

    pub async fn device_id(&self) -> String {
        self.identity.device_id().await
    }

    /// Run one sync. Never fails: errors are reported inside the result.
    pub async fn sync(&self, forced: Option<Direction>) -> SyncResult {
        let Some(_guard) = RunGuard::acquire(&self.in_progress) else {
            warn!("Sync requested while another sync is running");
            return SyncResult::already_in_progress();
        };

        match self.run(forced).await {
            Ok(result) => {
                info!("{}", result.message);
                result
            }
            Err(e) => {
                error!("Sync failed: {}", e);
                SyncResult::failed(&e)
            }
        }
    }

    async fn run(&self, forced: Option<Direction>) -> Result<SyncResult> {
        let snapshot = self.source.export_snapshot().await.map_err(SyncError::store)?;
        let uploaded_manifest = manifest::derive_manifest(&snapshot);
        let current_hash = snapshot.content_hash();

        let remote_meta = self.metadata.load_remote().await.map_err(SyncError::store)?;
        let local_meta = self.metadata.load_local().await.map_err(SyncError::store)?;

        let decision = ConflictResolver::decide(
            local_meta.as_ref(),
            remote_meta.as_ref(),
            &current_hash,
            forced,
        );
        info!(
            "Sync direction: {} ({})",
            decision.direction,
            decision.reason.description()
        );

        let device_id = self.identity.device_id().await;

        let (mut partial, files, data_hash) = match decision.direction {
            Direction::Upload => {
                let partial = self.transfer.upload(&snapshot, &device_id).await;
                (partial, uploaded_manifest, current_hash)
            }
            Direction::Download => {
                let (written, mut partial) = self.transfer.download(remote_meta.as_ref()).await;
                let files = if written.is_empty() {
                    remote_meta.map(|m| m.files).unwrap_or_default()
                } else {
                    written
                };
                let refreshed = match self.source.export_snapshot().await {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        // Downloaded data stays in place; both metadata records keep their old state.
                        let err = SyncError::store(e);
                        error!("Cannot hash local state after download: {}", err);
                        partial.errors.push(err.to_string());
                        return Ok(SyncResult::from_partial(decision.direction, partial));
                    }
                };
                (partial, files, refreshed.content_hash())
            }
        };

        // Metadata is written only once all data movement is done.
        let record = SyncMetadata::new(device_id, files, data_hash);
        if let Err(e) = self.metadata.save_local(&record).await {
            partial.errors.push(format!("{:#}", e));
        }
        if let Err(e) = self.metadata.save_remote(&record).await {
            partial.errors.push(format!("{:#}", e));
        }

        Ok(SyncResult::from_partial(decision.direction, partial))
    }

    /// Report local and remote metadata and the direction a sync would take.
    pub async fn status(&self) -> Result<SyncStatusReport> {
        let snapshot = self.source.export_snapshot().await.map_err(SyncError::store)?;
        let current_hash = snapshot.content_hash();
        let remote = self.metadata.load_remote().await.map_err(SyncError::store)?;
        let local = self.metadata.load_local().await.map_err(SyncError::store)?;
        let pending = ConflictResolver::decide(local.as_ref(), remote.as_ref(), &current_hash, None);

        Ok(SyncStatusReport {
            state: self.state(),
            local,
            remote,
            current_hash,
            pending,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_in_progress_result() {
        let result = SyncResult::already_in_progress();
        assert!(!result.success);
        assert!(result.is_already_in_progress());
        assert_eq!(result.outcome, SyncOutcome::AlreadyInProgress);
        assert_eq!(result.message, "Sync already in progress");
    }

    #[test]
    fn test_partial_result_message() {
        let partial = PartialResult {
            uploaded_files: 2,
            downloaded_files: 0,
            errors: vec!["a".into(), "b".into(), "c".into()],
        };
        let result = SyncResult::from_partial(Direction::Upload, partial);
        assert!(!result.success);
        assert_eq!(result.message, "Partial success: uploaded 2 files with 3 errors");
        assert_eq!(result.outcome, SyncOutcome::Partial);
        assert!(!result.is_already_in_progress());
    }

    #[test]
    fn test_failed_result_carries_single_error() {
        let result = SyncResult::failed(&SyncError::Store("boom".to_string()));
        assert!(!result.success);
        assert_eq!(result.outcome, SyncOutcome::Failed);
        assert!(!result.is_already_in_progress());
        assert_eq!(result.errors, vec!["Storage error: boom"]);
    }

    #[test]
    fn test_guard_releases_flag() {
        let flag = AtomicBool::new(false);
        {
            let _guard = RunGuard::acquire(&flag).unwrap();
            assert!(RunGuard::acquire(&flag).is_none());
        }
        assert!(RunGuard::acquire(&flag).is_some());
    }
}
