//! Error types for repository acquisition, traversal and publishing.
//!
//! Fatal conditions (anything that stops an ingestion) live in [`AcquireError`] and
//! [`IngestError`]. Per-file and per-run anomalies that only degrade the digest are
//! modelled as their own error types and downgraded to a [`Diagnostic`] where they occur.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures while turning a remote reference into a local working copy.
///
/// All message text is redacted before one of these is constructed.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("Repository not found or inaccessible: {0}")]
    NotFound(String),

    #[error("Failed to prepare staging directory {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Command failed: {command}\nError: {stderr}")]
    ToolExecution { command: String, stderr: String },

    #[error("Repository acquisition timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unexpected status {status} while probing {url}")]
    UnexpectedStatus { url: String, status: u16 },
}

/// Fatal failures of a whole ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error(transparent)]
    Acquire(#[from] AcquireError),

    #[error("{0} cannot be found")]
    PathNotFound(String),

    #[error("Path {0} is not a file")]
    NotAFile(PathBuf),

    #[error("File {0} has no content")]
    EmptyFile(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Problems reading the directory manifest. Never fatal.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Expected a string or list of strings for 'ignore_patterns' in {path}, got {found}")]
    WrongShape { path: PathBuf, found: String },

    #[error("Ignore patterns {0:?} are not strings, skipping them")]
    NonStringPatterns(Vec<String>),
}

/// A file whose content cannot be placed in the content blob.
#[derive(Debug, Error)]
pub enum ContentReadError {
    #[error("{path}: content is not valid UTF-8")]
    NotText { path: String },

    #[error("{path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("{path}: {size} bytes exceeds the per-file limit of {limit} bytes")]
    TooLarge { path: String, size: u64, limit: u64 },
}

/// Upload failures. The digest is kept when one of these occurs.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Upload transport failure for {key}: {message}")]
    Transport { key: String, message: String },

    #[error("Upload of {key} rejected with status {status}: {body}")]
    Rejected { key: String, status: u16, body: String },
}

/// What kind of non-fatal anomaly was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    DepthLimit,
    FileLimit,
    SizeLimit,
    Manifest,
    ContentRead,
    Publish,
    UnsupportedEntry,
}

/// A recorded, non-fatal anomaly. Carried in the ingestion result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub path: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, path: Option<&str>, message: impl Into<String>) -> Self {
        let diagnostic = Self {
            kind,
            path: path.map(str::to_owned),
            message: message.into(),
        };
        tracing::warn!(
            kind = ?diagnostic.kind,
            path = diagnostic.path.as_deref().unwrap_or(""),
            "{}",
            diagnostic.message
        );
        diagnostic
    }
}

impl From<ManifestError> for Diagnostic {
    fn from(err: ManifestError) -> Self {
        Diagnostic::new(DiagnosticKind::Manifest, None, err.to_string())
    }
}

impl From<ContentReadError> for Diagnostic {
    fn from(err: ContentReadError) -> Self {
        let path = match &err {
            ContentReadError::NotText { path }
            | ContentReadError::Unreadable { path, .. }
            | ContentReadError::TooLarge { path, .. } => path.clone(),
        };
        Diagnostic::new(DiagnosticKind::ContentRead, Some(path.as_str()), err.to_string())
    }
}

impl From<PublishError> for Diagnostic {
    fn from(err: PublishError) -> Self {
        Diagnostic::new(DiagnosticKind::Publish, None, err.to_string())
    }
}
