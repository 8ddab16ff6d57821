//! Coordinating module for the acquire → traverse → digest → publish pipeline.

use serde::Serialize;
use std::path::Path;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::contract::{CloneConfig, PublishOutcome, Publisher, RepositoryProbe};
use crate::digest::{self, Digest};
use crate::download::{self, GitAcquirer};
use crate::error::{Diagnostic, IngestError};
use crate::node::FileContent;
use crate::query::{IngestionQuery, QueryKind};
use crate::traversal;
use crate::upload::object_key;

/// Everything one ingestion produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestionResult {
    pub summary: String,
    pub tree: String,
    pub content: String,
    /// Where the full digest was published, if it was.
    pub content_url: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl IngestionResult {
    /// Summary, tree and content joined the way they are published.
    pub fn full_text(&self) -> String {
        format!("{}\n\n{}\n\n{}", self.summary, self.tree, self.content)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Runs ingestions against one set of settings. Holds no per-run state.
pub struct Ingestor<'a> {
    settings: &'a Settings,
    probe: &'a dyn RepositoryProbe,
    publisher: Option<&'a dyn Publisher>,
}

impl<'a> Ingestor<'a> {
    pub fn new(settings: &'a Settings, probe: &'a dyn RepositoryProbe) -> Self {
        Self {
            settings,
            probe,
            publisher: None,
        }
    }

    /// Used only when the settings name a real destination.
    pub fn with_publisher(mut self, publisher: &'a dyn Publisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Parses `source` and ingests it.
    pub async fn ingest_source(&self, source: &str) -> Result<IngestionResult, IngestError> {
        let query = IngestionQuery::parse(source, &self.settings.staging_dir)?;
        self.ingest(query).await
    }

    pub async fn ingest(&self, mut query: IngestionQuery) -> Result<IngestionResult, IngestError> {
        info!(source = %query.source, slug = %query.slug, "[INGEST] Starting ingestion");

        if query.needs_branch_resolution() {
            if let Some(url) = query.url.clone() {
                match download::fetch_remote_branches(&url, self.settings).await {
                    Ok(heads) => query.resolve_branch(&heads),
                    Err(e) => warn!(
                        error = %e,
                        "[INGEST] Could not list remote branches, taking the first segment as branch"
                    ),
                }
            }
        }

        if let Some(clone) = CloneConfig::from_query(&query) {
            let acquirer = GitAcquirer::new(self.settings, self.probe);
            if let Err(e) = acquirer.acquire(&clone).await {
                error!(error = %e, "[INGEST] Acquisition failed");
                return Err(e.into());
            }
        }

        let built = self.build_digest(&mut query);
        if query.is_remote() {
            remove_staging(&query.local_path).await;
        }
        let (digest, mut diagnostics) = built?;
        diagnostics.extend(digest.diagnostics.iter().cloned());

        let mut result = IngestionResult {
            summary: digest.summary,
            tree: digest.tree,
            content: digest.content,
            content_url: None,
            diagnostics,
        };

        match self.publish(&result, &query.slug).await {
            PublishOutcome::Published(url) => result.content_url = Some(url),
            PublishOutcome::NotConfigured => debug!("[INGEST] No publish destination configured"),
            PublishOutcome::Failed(e) => {
                warn!("[INGEST] Publishing failed, keeping the digest in the result");
                result.diagnostics.push(e.into());
            }
        }

        info!(
            slug = %query.slug,
            published = result.content_url.is_some(),
            diagnostics = result.diagnostics.len(),
            "[INGEST] Ingestion completed"
        );
        Ok(result)
    }

    fn build_digest(
        &self,
        query: &mut IngestionQuery,
    ) -> Result<(Digest, Vec<Diagnostic>), IngestError> {
        let target = query.target_path();
        if !target.exists() {
            error!(path = %target.display(), "[INGEST] Target path does not exist");
            return Err(IngestError::PathNotFound(query.slug.clone()));
        }

        if query.kind == QueryKind::Blob || query.local_path.is_file() {
            if !target.is_file() {
                return Err(IngestError::NotAFile(target));
            }
            let relative = match query.subpath.trim_matches('/') {
                "" => file_name(&target),
                subpath => subpath.to_string(),
            };
            let node = traversal::read_file_node(&target, relative, &self.settings.limits)?;
            if matches!(&node.content, Some(FileContent::Bytes(bytes)) if bytes.is_empty()) {
                return Err(IngestError::EmptyFile(node.name));
            }
            return Ok((digest::assemble_file(&node, query), Vec::new()));
        }

        let outcome = traversal::traverse(&target, query, &self.settings.limits)?;
        let digest = digest::assemble(&outcome.root, query);
        Ok((digest, outcome.diagnostics))
    }

    async fn publish(&self, result: &IngestionResult, slug: &str) -> PublishOutcome {
        let Some(destination) = self.settings.publish_destination() else {
            return PublishOutcome::NotConfigured;
        };
        let Some(publisher) = self.publisher else {
            warn!(bucket = %destination.bucket, "[PUBLISH] Destination configured but no publisher available");
            return PublishOutcome::NotConfigured;
        };
        let key = object_key(slug);
        match publisher.publish(&result.full_text(), &destination.bucket, &key).await {
            Ok(url) => PublishOutcome::Published(url),
            Err(e) => PublishOutcome::Failed(e),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Removes `<staging_dir>/<uuid>` once the working copy is no longer needed.
async fn remove_staging(local_path: &Path) {
    let Some(run_dir) = local_path.parent() else {
        return;
    };
    match tokio::fs::remove_dir_all(run_dir).await {
        Ok(()) => debug!(path = %run_dir.display(), "[INGEST] Removed staging directory"),
        Err(e) => warn!(path = %run_dir.display(), error = %e, "[INGEST] Failed to remove staging directory"),
    }
}
