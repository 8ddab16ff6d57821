//! # contract: seams between the ingestion pipeline and the outside world
//!
//! This module holds the traits the orchestrator talks to, plus the plain data types that
//! cross them:
//! - [`RepositoryProbe`]: "is this remote reachable?" (HTTP in production, mocks in tests)
//! - [`Publisher`]: "ship this digest somewhere and give me a link"
//! - [`CloneConfig`]: everything the acquirer needs for one clone
//!
//! ## Mocking & Testing
//! Both traits are annotated for `mockall`, and the generated `MockRepositoryProbe` /
//! `MockPublisher` are exported with the `test-export-mocks` feature so integration tests
//! can script probe answers and upload failures.

use async_trait::async_trait;
use mockall::automock;
use std::path::PathBuf;

use crate::error::{AcquireError, PublishError};
use crate::query::{IngestionQuery, QueryKind};

/// Everything needed to materialize one working copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneConfig {
    pub url: String,
    pub local_path: PathBuf,
    pub commit: Option<String>,
    pub branch: Option<String>,
    /// `/` disables partial clone mode.
    pub subpath: String,
    /// The reference pointed at a single file.
    pub blob: bool,
}

impl CloneConfig {
    /// `None` for local queries, which need no clone.
    pub fn from_query(query: &IngestionQuery) -> Option<Self> {
        let url = query.url.clone()?;
        Some(Self {
            url,
            local_path: query.local_path.clone(),
            commit: query.commit.clone(),
            branch: query.branch.clone(),
            subpath: query.subpath.clone(),
            blob: query.kind == QueryKind::Blob,
        })
    }

    pub fn partial_clone(&self) -> bool {
        self.subpath != "/"
    }
}

/// Checks whether a remote repository can be reached before cloning it.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RepositoryProbe: Send + Sync {
    /// `Ok(false)` for "not found" and for transport failures; `Err` only for
    /// protocol answers that make no sense.
    async fn exists(&self, url: &str) -> Result<bool, AcquireError>;
}

/// Uploads a finished digest.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Returns the dereferenceable location of the stored object.
    async fn publish(
        &self,
        content: &str,
        destination: &str,
        object_key: &str,
    ) -> Result<String, PublishError>;
}

/// Result of the optional publish step.
#[derive(Debug)]
pub enum PublishOutcome {
    Published(String),
    NotConfigured,
    Failed(PublishError),
}
