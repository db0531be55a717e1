//! Stable per-installation device identifier.
//!
//! The identifier is advisory: it attributes metadata records to a device and
//! shows up in diagnostics, but no sync decision depends on it.

use std::sync::Arc;

use crate::fs::LocalStore;

/// Local store key holding the memoized device id.
pub const DEVICE_ID_KEY: &str = "sync-device-id";

/// Environment signals that make up a device fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentSignals {
    /// Terminal surface as (columns, rows), when one is attached.
    pub surface: Option<(u16, u16)>,
    pub locale: String,
    /// Local UTC offset in minutes.
    pub tz_offset_minutes: i32,
    /// OS, architecture and host name.
    pub host: String,
}

impl EnvironmentSignals {
    /// Collect signals from the running process.
    pub fn collect() -> Self {
        let locale = ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
            .unwrap_or_else(|| "C".to_string());

        let hostname = std::env::var("HOSTNAME")
            .ok()
            .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
            .map(|h| h.trim().to_string())
            .unwrap_or_default();

        Self {
            surface: crossterm::terminal::size().ok(),
            locale,
            tz_offset_minutes: chrono::Local::now().offset().local_minus_utc() / 60,
            host: format!("{}-{}-{}", std::env::consts::OS, std::env::consts::ARCH, hostname),
        }
    }

    /// Fingerprint of these signals, base-36 encoded.
    pub fn fingerprint(&self) -> String {
        let surface = self
            .surface
            .map(|(cols, rows)| format!("{}x{}", cols, rows))
            .unwrap_or_else(|| "headless".to_string());
        let raw = format!(
            "{}|{}|{}|{}",
            surface, self.locale, self.tz_offset_minutes, self.host
        );
        to_base36(rolling_hash(&raw) as u64)
    }
}

/// 32-bit polynomial rolling hash (`h = h * 31 + byte`, wrapping).
pub fn rolling_hash(input: &str) -> u32 {
    input
        .bytes()
        .fold(0u32, |h, b| h.wrapping_mul(31).wrapping_add(b as u32))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Derives the device id once and memoizes it in the local store.
pub struct DeviceIdentity {
    store: Arc<dyn LocalStore>,
}

impl DeviceIdentity {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// Return the persisted device id, deriving and storing one on first use.
    pub async fn device_id(&self) -> String {
        match self.store.get(DEVICE_ID_KEY).await {
            Ok(Some(id)) if !id.trim().is_empty() => return id,
            Ok(_) => {}
            Err(e) => tracing::warn!("Failed to read device id: {:#}", e),
        }

        let id = generate_device_id(&EnvironmentSignals::collect());
        if let Err(e) = self.store.set(DEVICE_ID_KEY, id.clone()).await {
            tracing::warn!("Failed to persist device id: {:#}", e);
        } else {
            tracing::debug!("Generated device id {}", id);
        }
        id
    }
}

/// `device-<fingerprint>-<time>-<random>`; the suffix keeps devices with
/// identical fingerprints apart.
pub fn generate_device_id(signals: &EnvironmentSignals) -> String {
    let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "device-{}-{}-{}",
        signals.fingerprint(),
        to_base36(millis),
        &random[..8]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryStore;

    fn signals() -> EnvironmentSignals {
        EnvironmentSignals {
            surface: Some((120, 40)),
            locale: "en_US.UTF-8".to_string(),
            tz_offset_minutes: 60,
            host: "linux-x86_64-box".to_string(),
        }
    }

    #[test]
    fn test_rolling_hash_known_values() {
        assert_eq!(rolling_hash(""), 0);
        assert_eq!(rolling_hash("a"), 97);
        assert_eq!(rolling_hash("ab"), 97 * 31 + 98);
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn test_fingerprint_is_stable_and_signal_sensitive() {
        let a = signals();
        let mut b = signals();
        assert_eq!(a.fingerprint(), b.fingerprint());

        b.surface = None;
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_identical_fingerprints_get_distinct_ids() {
        let id1 = generate_device_id(&signals());
        let id2 = generate_device_id(&signals());
        assert!(id1.starts_with("device-"));
        assert_ne!(id1, id2);
    }

    #[tokio::test]
    async fn test_device_id_is_memoized() {
        let store = Arc::new(MemoryStore::new());
        let identity = DeviceIdentity::new(store.clone());

        let first = identity.device_id().await;
        let second = identity.device_id().await;
        assert_eq!(first, second);
        assert_eq!(store.get(DEVICE_ID_KEY).await.unwrap(), Some(first));
    }
}
