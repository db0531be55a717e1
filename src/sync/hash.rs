//! Content hashing for sync change detection.
//!
//! Snapshots are hashed over a canonical JSON form: top-level keys sorted,
//! nested objects rebuilt in key order, then SHA-256. The result depends on
//! content only, never on in-memory ordering.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Prefix marking a hash that was not derived from content.
pub const FALLBACK_PREFIX: &str = "fallback-";

static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Hash bytes using SHA-256, hex encoded.
pub fn hash_bytes(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Canonical hash of a snapshot's entries.
///
/// Never fails: if any value cannot be serialized a fallback hash is returned
/// instead, which differs from every stored hash and therefore always reads
/// as "changed".
pub fn hash_snapshot<'a, K, V, I>(entries: I) -> String
where
    I: IntoIterator<Item = (K, &'a V)>,
    K: AsRef<str>,
    V: Serialize + 'a,
{
    match try_hash_snapshot(entries) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::warn!("Snapshot is not serializable, using fallback hash: {}", e);
            fallback_hash()
        }
    }
}

/// Canonical hash of a snapshot's entries, surfacing serialization errors.
pub fn try_hash_snapshot<'a, K, V, I>(entries: I) -> Result<String, serde_json::Error>
where
    I: IntoIterator<Item = (K, &'a V)>,
    K: AsRef<str>,
    V: Serialize + 'a,
{
    let mut sorted = BTreeMap::new();
    for (key, value) in entries {
        let value = serde_json::to_value(value)?;
        sorted.insert(key.as_ref().to_string(), canonicalize(value));
    }

    let bytes = serde_json::to_vec(&sorted)?;
    Ok(hash_bytes(&bytes))
}

/// Hash seeded from the current time and a process-wide counter; unique per call.
pub fn fallback_hash() -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let seq = FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed);
    let seed = format!("{}:{}", nanos, seq);
    format!("{}{}", FALLBACK_PREFIX, &hash_bytes(seed.as_bytes())[..32])
}

pub fn is_fallback(hash: &str) -> bool {
    hash.starts_with(FALLBACK_PREFIX)
}

/// Rebuild every nested object with keys in lexicographic order.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, canonicalize(v)))
                .collect();
            Value::Object(sorted.into_iter().collect::<Map<String, Value>>())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}
