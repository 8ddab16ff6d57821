// repo-digest/src/config.rs

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::redact::{AccessToken, Redactor};

/// Bucket name shipped in sample configuration; treated as "not configured".
pub const PLACEHOLDER_BUCKET: &str = "your-digest-bucket-name";

pub const DEFAULT_GITHUB_API_BASE: &str = "https://api.github.com";

const MB: u64 = 1024 * 1024;

/// Traversal budgets shared by every ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_files: usize,
    pub max_total_size_bytes: u64,
    pub max_file_size_bytes: u64,
    pub max_directory_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_files: 1000,
            max_total_size_bytes: 50 * MB,
            max_file_size_bytes: MB,
            max_directory_depth: 10,
        }
    }
}

/// Where finished digests are uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishSettings {
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Overrides the virtual-hosted S3 endpoint, e.g. for S3-compatible stores.
    #[serde(default)]
    pub endpoint: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl PublishSettings {
    pub fn is_configured(&self) -> bool {
        let bucket = self.bucket.trim();
        !bucket.is_empty() && bucket != PLACEHOLDER_BUCKET
    }
}

/// Process-wide, immutable configuration. Built once at startup and passed by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub limits: Limits,
    pub clone_timeout_secs: u64,
    pub staging_dir: PathBuf,
    pub github_api_base: String,
    pub publish: Option<PublishSettings>,
    #[serde(skip)]
    pub access_token: Option<AccessToken>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            clone_timeout_secs: 60,
            staging_dir: std::env::temp_dir().join("repo-digest"),
            github_api_base: DEFAULT_GITHUB_API_BASE.to_string(),
            publish: None,
            access_token: None,
        }
    }
}

impl Settings {
    /// Builds settings from `REPO_DIGEST_*`, `GITHUB_PAT`, `AWS_REGION` and `TEMP_DIR`.
    /// A `.env` file is honoured if present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Limits::default();

        let limits = Limits {
            max_files: env_number("REPO_DIGEST_MAX_FILES", defaults.max_files as u64) as usize,
            max_total_size_bytes: env_megabytes(
                "REPO_DIGEST_MAX_TOTAL_SIZE_MB",
                defaults.max_total_size_bytes,
            ),
            max_file_size_bytes: env_megabytes(
                "REPO_DIGEST_MAX_FILE_SIZE_MB",
                defaults.max_file_size_bytes,
            ),
            max_directory_depth: env_number(
                "REPO_DIGEST_MAX_DIRECTORY_DEPTH",
                defaults.max_directory_depth as u64,
            ) as usize,
        };

        let publish = std::env::var("REPO_DIGEST_S3_BUCKET")
            .ok()
            .map(|bucket| PublishSettings {
                bucket,
                region: std::env::var("AWS_REGION").unwrap_or_else(|_| default_region()),
                endpoint: None,
            });

        let staging_dir = std::env::var("TEMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Settings::default().staging_dir);

        let settings = Settings {
            limits,
            clone_timeout_secs: env_number("REPO_DIGEST_CLONE_TIMEOUT_SECS", 60),
            staging_dir,
            github_api_base: DEFAULT_GITHUB_API_BASE.to_string(),
            publish,
            access_token: token_from_env(),
        };
        settings.trace_loaded();
        settings
    }

    pub fn clone_timeout(&self) -> Duration {
        Duration::from_secs(self.clone_timeout_secs)
    }

    /// The publish destination, if one other than the placeholder is configured.
    pub fn publish_destination(&self) -> Option<&PublishSettings> {
        self.publish.as_ref().filter(|p| p.is_configured())
    }

    pub fn redactor(&self) -> Redactor {
        Redactor::new(self.access_token.as_ref())
    }

    pub fn trace_loaded(&self) {
        info!(
            max_files = self.limits.max_files,
            max_total_size_bytes = self.limits.max_total_size_bytes,
            max_directory_depth = self.limits.max_directory_depth,
            staging_dir = %self.staging_dir.display(),
            publish_configured = self.publish_destination().is_some(),
            "Loaded Settings"
        );
        match &self.access_token {
            Some(token) => info!(token = %token.hint(), "GitHub access token detected"),
            None => warn!("No GitHub access token configured, private repositories are unreachable"),
        }
        debug!(?self, "Settings loaded (full debug)");
    }
}

/// Reads `GITHUB_PAT`, the single secret this crate handles.
pub(crate) fn token_from_env() -> Option<AccessToken> {
    std::env::var("GITHUB_PAT").ok().and_then(AccessToken::new)
}

fn env_number(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse::<u64>() {
            Ok(value) => value,
            Err(e) => {
                warn!(key, value = %raw, error = %e, "Ignoring malformed numeric setting");
                default
            }
        },
        Err(_) => default,
    }
}

/// A megabyte setting converted to bytes. Values that overflow fall back to `default_bytes`.
fn env_megabytes(key: &str, default_bytes: u64) -> u64 {
    let megabytes = env_number(key, default_bytes / MB);
    match megabytes.checked_mul(MB) {
        Some(bytes) => bytes,
        None => {
            warn!(key, value = megabytes, "Ignoring malformed numeric setting");
            default_bytes
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_placeholder_bucket_is_not_a_destination() {
        let mut settings = Settings::default();
        settings.publish = Some(PublishSettings {
            bucket: PLACEHOLDER_BUCKET.to_string(),
            region: default_region(),
            endpoint: None,
        });
        assert!(settings.publish_destination().is_none());

        settings.publish = Some(PublishSettings {
            bucket: "digests-prod".to_string(),
            region: "eu-west-1".to_string(),
            endpoint: None,
        });
        assert_eq!(
            settings.publish_destination().map(|p| p.bucket.as_str()),
            Some("digests-prod")
        );
    }

    #[test]
    #[serial]
    fn test_from_env_reads_limits_and_token() {
        std::env::set_var("REPO_DIGEST_MAX_FILES", "25");
        std::env::set_var("REPO_DIGEST_MAX_TOTAL_SIZE_MB", "2");
        std::env::set_var("REPO_DIGEST_MAX_DIRECTORY_DEPTH", "not-a-number");
        std::env::set_var("GITHUB_PAT", "ghp_fromenvironment");

        let settings = Settings::from_env();

        assert_eq!(settings.limits.max_files, 25);
        assert_eq!(settings.limits.max_total_size_bytes, 2 * MB);
        assert_eq!(settings.limits.max_directory_depth, 10);
        assert_eq!(
            settings.access_token.as_ref().map(|t| t.expose()),
            Some("ghp_fromenvironment")
        );

        std::env::remove_var("REPO_DIGEST_MAX_FILES");
        std::env::remove_var("REPO_DIGEST_MAX_TOTAL_SIZE_MB");
        std::env::remove_var("REPO_DIGEST_MAX_DIRECTORY_DEPTH");
        std::env::remove_var("GITHUB_PAT");
    }

    #[test]
    #[serial]
    fn test_oversized_megabyte_limits_fall_back_to_defaults() {
        std::env::set_var("REPO_DIGEST_MAX_TOTAL_SIZE_MB", u64::MAX.to_string());
        std::env::set_var("REPO_DIGEST_MAX_FILE_SIZE_MB", "18446744073709");

        let settings = Settings::from_env();
        let defaults = Limits::default();

        assert_eq!(settings.limits.max_total_size_bytes, defaults.max_total_size_bytes);
        assert_eq!(settings.limits.max_file_size_bytes, defaults.max_file_size_bytes);

        std::env::remove_var("REPO_DIGEST_MAX_TOTAL_SIZE_MB");
        std::env::remove_var("REPO_DIGEST_MAX_FILE_SIZE_MB");
    }
}
