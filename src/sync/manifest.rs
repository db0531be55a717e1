//! Manifest derivation and remote key normalization.
//!
//! A manifest entry is a logical file name such as `beans.json`: no remote
//! prefix, and one entry per top-level snapshot key. Remote keys are the
//! entry placed under the configured prefix.

use std::collections::BTreeSet;

use crate::sync::snapshot::SyncSnapshot;

/// Set of manifest entries.
pub type Manifest = BTreeSet<String>;

pub const ENTRY_EXTENSION: &str = ".json";

/// Remote object holding the serialized sync metadata.
pub const METADATA_FILE: &str = "sync-metadata.json";

/// Best-effort diagnostic object written after uploads.
pub const DEVICE_INFO_FILE: &str = "device-info.json";

/// Manifest entry for a snapshot key.
pub fn entry_for(key: &str) -> String {
    format!("{}{}", key, ENTRY_EXTENSION)
}

/// Local store key for a manifest entry.
pub fn logical_name(entry: &str) -> &str {
    entry.strip_suffix(ENTRY_EXTENSION).unwrap_or(entry)
}

/// Entries for every top-level key of the snapshot.
pub fn derive_manifest(snapshot: &SyncSnapshot) -> Manifest {
    snapshot.entries().keys().map(|k| entry_for(k)).collect()
}

/// Whether an entry names one of the engine's own bookkeeping objects.
pub fn is_bookkeeping(entry: &str) -> bool {
    entry == METADATA_FILE || entry == DEVICE_INFO_FILE
}

/// Strip the `prefix/` directory (the configured prefix may carry a trailing
/// separator or not) and any leftover leading separators from a raw remote key.
///
/// The prefix only matches as a whole path segment: with prefix `data`, the
/// key `database.json` is left alone. Returns `None` when nothing is left.
pub fn normalize_key(raw: &str, prefix: &str) -> Option<String> {
    let prefix = prefix.trim_matches('/');
    let mut key = raw.trim_start_matches('/');

    if !prefix.is_empty() {
        if let Some(rest) = key
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('/'))
        {
            key = rest;
        } else if key == prefix {
            key = "";
        }
    }

    let key = key.trim_start_matches('/');
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}

/// Remote key for a manifest entry; inverse of [`normalize_key`].
pub fn remote_key_for(entry: &str, prefix: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let entry = entry.trim_start_matches('/');
    if prefix.is_empty() {
        entry.to_string()
    } else {
        format!("{}/{}", prefix, entry)
    }
}

/// Key codec bound to one configured prefix.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ManifestCodec {
    prefix: String,
}

impl ManifestCodec {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn remote_key(&self, entry: &str) -> String {
        remote_key_for(entry, &self.prefix)
    }

    pub fn normalize(&self, raw: &str) -> Option<String> {
        normalize_key(raw, &self.prefix)
    }

    /// Normalize raw remote keys into a manifest, dropping empty names and
    /// collapsing duplicates.
    pub fn collect<'a, I>(&self, raw_keys: I) -> Manifest
    where
        I: IntoIterator<Item = &'a str>,
    {
        raw_keys
            .into_iter()
            .filter_map(|raw| self.normalize(raw))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_derive_manifest() {
        let mut snapshot = SyncSnapshot::new();
        snapshot.insert("beans", json!([]));
        snapshot.insert("notes", json!([]));

        let manifest = derive_manifest(&snapshot);
        assert_eq!(
            manifest.into_iter().collect::<Vec<_>>(),
            vec!["beans.json", "notes.json"]
        );
    }

    #[test]
    fn test_round_trip_for_all_prefix_forms() {
        for prefix in ["", "/", "data", "data/", "/data/", "a/b", "a/b/"] {
            for entry in ["beans.json", "nested/notes.json", "data.json", "database.json"] {
                let remote = remote_key_for(entry, prefix);
                assert_eq!(
                    normalize_key(&remote, prefix).as_deref(),
                    Some(entry),
                    "prefix {:?} entry {:?}",
                    prefix,
                    entry
                );
            }
        }
    }

    #[test]
    fn test_normalize_strips_prefix_with_or_without_trailing_separator() {
        assert_eq!(normalize_key("data/beans.json", "data").as_deref(), Some("beans.json"));
        assert_eq!(normalize_key("data/beans.json", "data/").as_deref(), Some("beans.json"));
        assert_eq!(normalize_key("data//beans.json", "data/").as_deref(), Some("beans.json"));
        assert_eq!(normalize_key("beans.json", "data").as_deref(), Some("beans.json"));
    }

    #[test]
    fn test_keys_starting_with_prefix_text_are_kept() {
        for prefix in ["data", "data/"] {
            assert_eq!(normalize_key("databeans.json", prefix).as_deref(), Some("databeans.json"));
            assert_eq!(normalize_key("database.json", prefix).as_deref(), Some("database.json"));
            assert_eq!(normalize_key("data.json", prefix).as_deref(), Some("data.json"));
            assert_eq!(normalize_key("data/data.json", prefix).as_deref(), Some("data.json"));
            assert_eq!(
                normalize_key("data/database.json", prefix).as_deref(),
                Some("database.json")
            );
        }
    }

    #[test]
    fn test_empty_result_is_discarded() {
        assert_eq!(normalize_key("data/", "data"), None);
        assert_eq!(normalize_key("data", "data/"), None);
        assert_eq!(normalize_key("", ""), None);

        let codec = ManifestCodec::new("data");
        let manifest = codec.collect(["data/a.json", "data/", "a.json", "data/a.json"]);
        assert_eq!(manifest.len(), 1);
    }

    #[test]
    fn test_logical_name() {
        assert_eq!(logical_name("beans.json"), "beans");
        assert_eq!(logical_name("README"), "README");
        assert!(is_bookkeeping(METADATA_FILE));
        assert!(!is_bookkeeping("beans.json"));
    }
}
