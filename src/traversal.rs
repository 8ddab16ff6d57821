//! Bounded, depth-first walk of a local directory into a [`FileSystemNode`] tree.
//!
//! Three budgets are enforced, each in its own way:
//! - a file that would push the visited byte total over the cap is skipped, and its
//!   siblings are still considered;
//! - once the visited file count reaches its cap, further files and symlinks are skipped
//!   while directories are still entered;
//! - a directory deeper than the depth cap, or met while either running budget is
//!   already exhausted, is kept as an empty node and its contents are never read.
//!
//! Node paths, and the paths patterns are matched against, are relative to the working
//! copy root (`query.local_path`), also when only a subpath is walked.
//!
//! Limit conditions are never errors; they surface as [`Diagnostic`]s.

use std::fs::{self, ReadDir};
use std::path::Path;
use tracing::{debug, info};

use crate::config::Limits;
use crate::error::{Diagnostic, DiagnosticKind, IngestError};
use crate::filter::PatternFilter;
use crate::manifest::apply_manifest;
use crate::node::{FileContent, FileSystemNode, FileSystemStats};
use crate::query::IngestionQuery;

#[derive(Debug)]
pub struct TraversalOutcome {
    pub root: FileSystemNode,
    pub stats: FileSystemStats,
    pub diagnostics: Vec<Diagnostic>,
}

/// Walks `root_dir`, which is `query.target_path()`. The manifest found there is merged
/// into `query` first.
///
/// Only failing to list `root_dir` itself is an error.
pub fn traverse(
    root_dir: &Path,
    query: &mut IngestionQuery,
    limits: &Limits,
) -> Result<TraversalOutcome, IngestError> {
    let mut diagnostics = apply_manifest(root_dir, query);
    let (filter, pattern_diagnostics) =
        PatternFilter::new(&query.ignore_patterns, &query.include_patterns);
    diagnostics.extend(pattern_diagnostics);

    info!(
        root = %root_dir.display(),
        ignore = query.ignore_patterns.len(),
        include = query.include_patterns.len(),
        "[TRAVERSE] Starting traversal"
    );

    let entries = fs::read_dir(root_dir)?;
    let name = root_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| query.slug.clone());
    let base = query.subpath.trim_matches('/').to_string();
    let mut root = FileSystemNode::directory(name, base, 0);

    let mut walker = Walker {
        filter,
        limits,
        stats: FileSystemStats::default(),
        diagnostics,
        file_limit_reported: false,
    };
    walker.visit_entries(entries, &mut root);

    info!(
        files = walker.stats.total_files,
        bytes = walker.stats.total_size,
        retained_files = root.file_count,
        diagnostics = walker.diagnostics.len(),
        "[TRAVERSE] Traversal finished"
    );

    Ok(TraversalOutcome {
        root,
        stats: walker.stats,
        diagnostics: walker.diagnostics,
    })
}

struct Walker<'a> {
    filter: PatternFilter,
    limits: &'a Limits,
    stats: FileSystemStats,
    diagnostics: Vec<Diagnostic>,
    file_limit_reported: bool,
}

impl Walker<'_> {
    fn visit_entries(&mut self, entries: ReadDir, node: &mut FileSystemNode) {
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    self.record(
                        DiagnosticKind::UnsupportedEntry,
                        Some(node.path.as_str()),
                        format!("Failed to read directory entry: {e}"),
                    );
                    continue;
                }
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            let relative = join_relative(&node.path, &name);
            let depth = node.depth + 1;

            if self.filter.is_excluded(&relative) {
                continue;
            }

            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(e) => {
                    self.record(
                        DiagnosticKind::UnsupportedEntry,
                        Some(relative.as_str()),
                        format!("Failed to stat entry: {e}"),
                    );
                    continue;
                }
            };

            if file_type.is_symlink() {
                if let Some(link) = self.visit_symlink(name, relative, depth) {
                    node.push_child(link);
                }
            } else if file_type.is_file() {
                if let Some(file) = self.visit_file(&entry.path(), name, relative, depth) {
                    node.push_child(file);
                }
            } else if file_type.is_dir() {
                if let Some(dir) = self.visit_dir(&entry.path(), name, relative, depth) {
                    node.push_child(dir);
                }
            } else {
                self.record(
                    DiagnosticKind::UnsupportedEntry,
                    Some(relative.as_str()),
                    "Unsupported file type, skipping",
                );
            }
        }
        node.sort_children();
    }

    fn visit_symlink(&mut self, name: String, relative: String, depth: usize) -> Option<FileSystemNode> {
        if !self.filter.is_included(&relative) {
            return None;
        }
        if self.file_cap_reached(&relative) {
            return None;
        }
        self.stats.total_files += 1;
        debug!(path = %relative, "[TRAVERSE] Recorded symlink");
        Some(FileSystemNode::symlink(name, relative, depth))
    }

    fn visit_file(
        &mut self,
        path: &Path,
        name: String,
        relative: String,
        depth: usize,
    ) -> Option<FileSystemNode> {
        if !self.filter.is_included(&relative) {
            return None;
        }

        let size = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                self.record(
                    DiagnosticKind::UnsupportedEntry,
                    Some(relative.as_str()),
                    format!("Failed to read metadata: {e}"),
                );
                return None;
            }
        };

        if self.stats.total_size + size > self.limits.max_total_size_bytes {
            self.record(
                DiagnosticKind::SizeLimit,
                Some(relative.as_str()),
                format!(
                    "Skipping file: {size} bytes would exceed the total size limit of {} bytes",
                    self.limits.max_total_size_bytes
                ),
            );
            return None;
        }
        if self.file_cap_reached(&relative) {
            return None;
        }

        self.stats.total_files += 1;
        self.stats.total_size += size;

        let content = read_content(path, size, self.limits);
        debug!(path = %relative, size, "[TRAVERSE] Recorded file");
        Some(FileSystemNode::file(name, relative, depth, size, content))
    }

    fn visit_dir(
        &mut self,
        path: &Path,
        name: String,
        relative: String,
        depth: usize,
    ) -> Option<FileSystemNode> {
        if let Some((kind, message)) = self.cutoff(depth) {
            self.record(kind, Some(relative.as_str()), message);
            return Some(FileSystemNode::directory(name, relative, depth));
        }

        let entries = match fs::read_dir(path) {
            Ok(entries) => entries,
            Err(e) => {
                self.record(
                    DiagnosticKind::UnsupportedEntry,
                    Some(relative.as_str()),
                    format!("Failed to list directory: {e}"),
                );
                return None;
            }
        };

        let mut dir = FileSystemNode::directory(name, relative, depth);
        self.visit_entries(entries, &mut dir);
        Some(dir)
    }

    /// Why a directory at `depth` must not be read, if it must not.
    fn cutoff(&self, depth: usize) -> Option<(DiagnosticKind, String)> {
        let limits = self.limits;
        if depth > limits.max_directory_depth {
            return Some((
                DiagnosticKind::DepthLimit,
                format!("Maximum depth limit ({}) reached", limits.max_directory_depth),
            ));
        }
        if self.stats.total_files >= limits.max_files {
            return Some((
                DiagnosticKind::FileLimit,
                format!("Maximum file limit ({}) reached", limits.max_files),
            ));
        }
        if self.stats.total_size >= limits.max_total_size_bytes {
            return Some((
                DiagnosticKind::SizeLimit,
                format!(
                    "Maximum total size limit ({} bytes) reached",
                    limits.max_total_size_bytes
                ),
            ));
        }
        None
    }

    /// Reported once per traversal; every later skip is silent.
    fn file_cap_reached(&mut self, relative: &str) -> bool {
        if self.stats.total_files < self.limits.max_files {
            return false;
        }
        if !self.file_limit_reported {
            self.file_limit_reported = true;
            let message = format!(
                "Maximum file limit ({}) reached, skipping remaining files",
                self.limits.max_files
            );
            self.record(DiagnosticKind::FileLimit, Some(relative), message);
        }
        true
    }

    fn record(&mut self, kind: DiagnosticKind, path: Option<&str>, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(kind, path, message));
    }
}

/// A single file as a node, for single-file ingestions. No budgets apply.
pub fn read_file_node(path: &Path, relative: String, limits: &Limits) -> Result<FileSystemNode, IngestError> {
    let size = fs::metadata(path)?.len();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| relative.clone());
    let depth = relative.split('/').count();
    Ok(FileSystemNode::file(name, relative, depth, size, read_content(path, size, limits)))
}

fn read_content(path: &Path, size: u64, limits: &Limits) -> FileContent {
    if size > limits.max_file_size_bytes {
        return FileContent::TooLarge {
            size,
            limit: limits.max_file_size_bytes,
        };
    }
    match fs::read(path) {
        Ok(bytes) => FileContent::Bytes(bytes),
        Err(e) => FileContent::Unreadable(e.to_string()),
    }
}

fn join_relative(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}
