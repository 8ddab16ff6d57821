//! Per-directory manifest: a `.repodigest` TOML file at the traversal root that adds
//! ignore patterns to the query.
//!
//! ```toml
//! [config]
//! ignore_patterns = ["*.lock", "docs/generated"]
//! ```
//!
//! A single string is accepted in place of the list. Problems with the file never stop
//! an ingestion; they are reported as diagnostics.

use std::path::Path;
use tracing::{debug, info};

use crate::error::{Diagnostic, ManifestError};
use crate::query::IngestionQuery;

pub const MANIFEST_FILE: &str = ".repodigest";

/// Patterns read from a manifest.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Manifest {
    pub ignore_patterns: Vec<String>,
    /// Entries of the pattern list that were not strings, rendered as TOML.
    pub rejected: Vec<String>,
}

/// Reads the manifest under `dir`. `Ok(None)` when there is no manifest file.
pub fn read_manifest(dir: &Path) -> Result<Option<Manifest>, ManifestError> {
    let path = dir.join(MANIFEST_FILE);
    if !path.is_file() {
        return Ok(None);
    }

    let raw = std::fs::read_to_string(&path).map_err(|source| ManifestError::Read {
        path: path.clone(),
        source,
    })?;
    let document: toml::Table = toml::from_str(&raw).map_err(|e| ManifestError::Parse {
        path: path.clone(),
        message: e.message().to_string(),
    })?;

    let Some(value) = document
        .get("config")
        .and_then(|config| config.get("ignore_patterns"))
    else {
        debug!(path = %path.display(), "Manifest has no ignore_patterns entry");
        return Ok(Some(Manifest::default()));
    };

    let mut manifest = Manifest::default();
    match value {
        toml::Value::String(pattern) => manifest.ignore_patterns.push(pattern.clone()),
        toml::Value::Array(entries) => {
            for entry in entries {
                match entry {
                    toml::Value::String(pattern) => manifest.ignore_patterns.push(pattern.clone()),
                    other => manifest.rejected.push(other.to_string()),
                }
            }
        }
        other => {
            return Err(ManifestError::WrongShape {
                path,
                found: other.type_str().to_string(),
            })
        }
    }
    Ok(Some(manifest))
}

/// Merges the manifest found under `dir` into the query's ignore set.
pub fn apply_manifest(dir: &Path, query: &mut IngestionQuery) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    match read_manifest(dir) {
        Ok(None) => {}
        Ok(Some(manifest)) => {
            if !manifest.rejected.is_empty() {
                diagnostics.push(ManifestError::NonStringPatterns(manifest.rejected).into());
            }
            if !manifest.ignore_patterns.is_empty() {
                info!(
                    count = manifest.ignore_patterns.len(),
                    "[TRAVERSE] Applying ignore patterns from manifest"
                );
                query.ignore_patterns.extend(manifest.ignore_patterns);
            }
        }
        Err(e) => diagnostics.push(e.into()),
    }
    diagnostics
}
