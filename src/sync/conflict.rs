//! Sync direction arbitration.
//!
//! Conflicts are settled at whole-snapshot granularity: one side's snapshot
//! replaces the other's. Two devices that edit disjoint parts of the state
//! between syncs will lose one set of edits.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::sync::metadata::SyncMetadata;

/// Which way data moves during a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Push local state to the remote store.
    Upload,
    /// Pull remote state into local storage.
    Download,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upload => write!(f, "upload"),
            Direction::Download => write!(f, "download"),
        }
    }
}

/// Why a direction was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    /// Caller override.
    Forced,
    /// Nothing on the remote yet.
    RemoteMissing,
    /// This device has never synced.
    LocalMissing,
    /// Local content changed since the last recorded sync.
    LocalChanged,
    /// Local unchanged, remote holds content from another device.
    RemoteChanged,
    /// Nothing changed; remote is not newer, so local is re-asserted.
    TieBreakLocal,
    /// Nothing changed by hash, but the remote record is newer.
    TieBreakRemoteNewer,
}

impl DecisionReason {
    /// Get a human-readable description of the reason.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Forced => "direction forced by caller",
            Self::RemoteMissing => "no remote metadata yet",
            Self::LocalMissing => "no local sync history",
            Self::LocalChanged => "local data changed since last sync",
            Self::RemoteChanged => "remote data changed on another device",
            Self::TieBreakLocal => "no changes; re-asserting local copy",
            Self::TieBreakRemoteNewer => "no changes; remote record is newer",
        }
    }
}

/// A direction together with the rule that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub direction: Direction,
    pub reason: DecisionReason,
}

impl Decision {
    fn new(direction: Direction, reason: DecisionReason) -> Self {
        Self { direction, reason }
    }
}

/// Whole-snapshot last-writer-wins resolver.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConflictResolver;

impl ConflictResolver {
    /// Decide the sync direction. The first matching rule wins; a forced
    /// direction skips the rules entirely.
    pub fn decide(
        local: Option<&SyncMetadata>,
        remote: Option<&SyncMetadata>,
        current_hash: &str,
        forced: Option<Direction>,
    ) -> Decision {
        if let Some(direction) = forced {
            return Decision::new(direction, DecisionReason::Forced);
        }

        let Some(remote) = remote else {
            return Decision::new(Direction::Upload, DecisionReason::RemoteMissing);
        };
        let Some(local) = local else {
            return Decision::new(Direction::Download, DecisionReason::LocalMissing);
        };

        if local.data_hash != current_hash {
            return Decision::new(Direction::Upload, DecisionReason::LocalChanged);
        }
        if remote.data_hash != current_hash {
            return Decision::new(Direction::Download, DecisionReason::RemoteChanged);
        }

        if remote.last_sync_time > local.last_sync_time {
            Decision::new(Direction::Download, DecisionReason::TieBreakRemoteNewer)
        } else {
            Decision::new(Direction::Upload, DecisionReason::TieBreakLocal)
        }
    }

    pub fn decide_direction(
        local: Option<&SyncMetadata>,
        remote: Option<&SyncMetadata>,
        current_hash: &str,
        forced: Option<Direction>,
    ) -> Direction {
        Self::decide(local, remote, current_hash, forced).direction
    }
}
