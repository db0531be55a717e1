use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::fs::types::ObjectEntry;

/// Backend type information for display and identification
#[derive(Debug, Clone, PartialEq)]
pub enum BackendType {
    S3 { bucket: String, region: String, provider: S3Provider },
    Memory,
}

impl BackendType {
    /// Get a short display name for the backend
    pub fn short_name(&self) -> &'static str {
        match self {
            BackendType::S3 { .. } => "S3",
            BackendType::Memory => "Memory",
        }
    }

    /// One-line summary for status output, e.g. `S3 bucket notes (MinIO, us-east-1)`.
    pub fn describe(&self) -> String {
        match self {
            BackendType::S3 {
                bucket,
                region,
                provider,
            } => format!(
                "{} bucket {} ({}, {})",
                self.short_name(),
                bucket,
                provider.display_name(),
                region
            ),
            BackendType::Memory => self.short_name().to_string(),
        }
    }
}

/// S3-compatible storage providers
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum S3Provider {
    #[default]
    Aws,
    DigitalOcean,
    Hetzner,
    MinIO,
    #[serde(rename = "r2")]
    CloudflareR2,
    Wasabi,
    Custom,
}

impl S3Provider {
    /// Get the endpoint URL for this provider.
    ///
    /// `Custom` has no preset; the configured endpoint is used instead.
    pub fn endpoint(&self, region: &str) -> Option<String> {
        match self {
            S3Provider::Aws => None, // Use default AWS endpoint
            S3Provider::DigitalOcean => Some(format!("https://{}.digitaloceanspaces.com", region)),
            S3Provider::Hetzner => Some(format!("https://{}.your-objectstorage.com", region)),
            S3Provider::MinIO => Some("http://localhost:9000".to_string()),
            S3Provider::CloudflareR2 => Some(format!("https://{}.r2.cloudflarestorage.com", region)),
            S3Provider::Wasabi => Some(format!("https://s3.{}.wasabisys.com", region)),
            S3Provider::Custom => None,
        }
    }

    /// Get display name for the provider
    pub fn display_name(&self) -> &str {
        match self {
            S3Provider::Aws => "AWS S3",
            S3Provider::DigitalOcean => "DigitalOcean Spaces",
            S3Provider::Hetzner => "Hetzner Object Storage",
            S3Provider::MinIO => "MinIO",
            S3Provider::CloudflareR2 => "Cloudflare R2",
            S3Provider::Wasabi => "Wasabi",
            S3Provider::Custom => "Custom S3",
        }
    }
}

/// Object storage transport consumed by the sync engine.
///
/// Keys are full object keys relative to the bucket root; prefix handling is
/// the caller's business. Retries and authentication live behind this trait.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write an object, replacing any existing content.
    async fn put_object(&self, key: &str, content: Vec<u8>) -> Result<()>;

    /// Read an object. A missing object is `Ok(None)`, not an error.
    async fn get_object(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// List every object whose key starts with `prefix` (recursively).
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectEntry>>;

    /// Verify the store is reachable with the configured credentials.
    async fn test_connection(&self) -> Result<()>;

    /// Get the backend type
    fn backend_type(&self) -> BackendType;

    /// Get display path for a key
    fn display_path(&self, key: &str) -> String {
        key.to_string()
    }
}

/// Local persistent key-value store holding the application snapshot and
/// sync bookkeeping.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: String) -> Result<()>;

    async fn keys(&self) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_endpoints() {
        assert_eq!(S3Provider::Aws.endpoint("us-east-1"), None);
        assert_eq!(
            S3Provider::Wasabi.endpoint("eu-central-1").as_deref(),
            Some("https://s3.eu-central-1.wasabisys.com")
        );
        assert_eq!(S3Provider::Custom.endpoint("x"), None);
    }

    #[test]
    fn test_provider_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            provider: S3Provider,
        }

        let w: Wrapper = toml::from_str("provider = \"r2\"").unwrap();
        assert_eq!(w.provider, S3Provider::CloudflareR2);
        let w: Wrapper = toml::from_str("provider = \"minio\"").unwrap();
        assert_eq!(w.provider, S3Provider::MinIO);
        let w: Wrapper = toml::from_str("provider = \"digitalocean\"").unwrap();
        assert_eq!(w.provider, S3Provider::DigitalOcean);
    }

    #[test]
    fn test_backend_short_name() {
        assert_eq!(BackendType::Memory.short_name(), "Memory");
    }

    #[test]
    fn test_backend_describe_names_provider() {
        let backend = BackendType::S3 {
            bucket: "notes".to_string(),
            region: "auto".to_string(),
            provider: S3Provider::CloudflareR2,
        };
        assert_eq!(backend.describe(), "S3 bucket notes (Cloudflare R2, auto)");
        assert_eq!(BackendType::Memory.describe(), "Memory");
    }
}
