use crate::config::{token_from_env, Settings};
use anyhow::Result;
use std::fs;
use std::path::Path;
use tracing::{error, info};

/// Loads a static YAML settings file (no secrets) and injects the access token from
/// `GITHUB_PAT`. Fields missing from the file keep their defaults.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading settings from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Settings file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read settings file");
            return Err(anyhow::anyhow!(
                "Failed to read settings file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let mut settings: Settings = match serde_yaml::from_str(&config_content) {
        Ok(settings) => {
            info!(config_path = ?path_ref, "Parsed settings YAML successfully");
            settings
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse settings YAML");
            return Err(anyhow::anyhow!("Failed to parse settings YAML: {e}"));
        }
    };

    if settings.limits.max_files == 0 {
        error!("limits.max_files must be positive");
        anyhow::bail!("limits.max_files must be positive");
    }

    settings.access_token = token_from_env();
    settings.trace_loaded();
    Ok(settings)
}
