//! Sync configuration loaded from a TOML file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::fs::S3Provider;

/// Default name of the object holding a full application export.
pub const DEFAULT_EXPORT_FILE: &str = "app-export.json";

const ACCESS_KEY_ENV: &str = "SNAPSYNC_ACCESS_KEY_ID";
const SECRET_KEY_ENV: &str = "SNAPSYNC_SECRET_ACCESS_KEY";

/// Remote store and local store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// S3-compatible provider; selects the endpoint preset.
    pub provider: S3Provider,
    /// Explicit endpoint. Required for `custom`, overrides the preset otherwise.
    pub endpoint: Option<String>,
    pub region: String,
    pub bucket: String,
    /// Key prefix under which all sync objects live. May be empty.
    pub prefix: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Location of the local JSON store.
    pub store_path: Option<PathBuf>,
    /// Object tried when the remote manifest and listing are both empty.
    pub default_export_file: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            provider: S3Provider::Aws,
            endpoint: None,
            region: "us-east-1".to_string(),
            bucket: String::new(),
            prefix: String::new(),
            access_key_id: None,
            secret_access_key: None,
            store_path: None,
            default_export_file: DEFAULT_EXPORT_FILE.to_string(),
        }
    }
}

impl SyncConfig {
    /// Default config file location: `<config dir>/snapsync/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("snapsync").join("config.toml"))
    }

    /// Load and validate a config file, applying credential overrides from the
    /// environment.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: SyncConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(ACCESS_KEY_ENV) {
            self.access_key_id = Some(key);
        }
        if let Ok(secret) = std::env::var(SECRET_KEY_ENV) {
            self.secret_access_key = Some(secret);
        }
    }

    pub fn validate(&self) -> std::result::Result<(), SyncError> {
        if self.bucket.trim().is_empty() {
            return Err(SyncError::Config("bucket must not be empty".to_string()));
        }
        if self.region.trim().is_empty() {
            return Err(SyncError::Config("region must not be empty".to_string()));
        }
        if self.provider == S3Provider::Custom && self.endpoint.is_none() {
            return Err(SyncError::Config(
                "custom provider requires an endpoint".to_string(),
            ));
        }
        if self.access_key_id.is_some() != self.secret_access_key.is_some() {
            return Err(SyncError::Config(
                "access_key_id and secret_access_key must be set together".to_string(),
            ));
        }
        if self.default_export_file.trim().is_empty() {
            return Err(SyncError::Config(
                "default_export_file must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Endpoint to hand to the S3 client, if any.
    pub fn resolved_endpoint(&self) -> Option<String> {
        self.endpoint
            .clone()
            .or_else(|| self.provider.endpoint(&self.region))
    }

    /// Local store path, defaulting to `<data dir>/snapsync/store.json`.
    pub fn resolved_store_path(&self) -> PathBuf {
        self.store_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("snapsync")
                .join("store.json")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_minimal_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "provider = \"wasabi\"\nregion = \"eu-central-1\"\nbucket = \"brews\"\nprefix = \"coffee/\""
        )
        .unwrap();

        let config = SyncConfig::load(file.path()).unwrap();
        assert_eq!(config.provider, S3Provider::Wasabi);
        assert_eq!(config.bucket, "brews");
        assert_eq!(config.prefix, "coffee/");
        assert_eq!(config.default_export_file, DEFAULT_EXPORT_FILE);
        assert_eq!(
            config.resolved_endpoint().as_deref(),
            Some("https://s3.eu-central-1.wasabisys.com")
        );
    }

    #[test]
    fn test_validate_rejects_empty_bucket() {
        let config = SyncConfig::default();
        assert!(matches!(config.validate(), Err(SyncError::Config(_))));
    }

    #[test]
    fn test_custom_provider_requires_endpoint() {
        let mut config = SyncConfig {
            bucket: "b".to_string(),
            provider: S3Provider::Custom,
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());

        config.endpoint = Some("https://minio.internal:9000".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(
            config.resolved_endpoint().as_deref(),
            Some("https://minio.internal:9000")
        );
    }

    #[test]
    fn test_half_credentials_rejected() {
        let config = SyncConfig {
            bucket: "b".to_string(),
            access_key_id: Some("AKIA".to_string()),
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_store_path_wins() {
        let config = SyncConfig {
            store_path: Some(PathBuf::from("/tmp/s.json")),
            ..SyncConfig::default()
        };
        assert_eq!(config.resolved_store_path(), PathBuf::from("/tmp/s.json"));
    }
}
