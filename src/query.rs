//! Parsing a user-supplied source reference into an [`IngestionQuery`].
//!
//! Accepted inputs:
//! - a local path (relative paths are resolved against the current directory);
//! - a repository URL on a known host, with or without scheme, optionally followed by
//!   `/tree/<ref>/<path>` or `/blob/<ref>/<path>`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::IngestError;

pub const KNOWN_HOSTS: &[&str] = &[
    "github.com",
    "gitlab.com",
    "bitbucket.org",
    "codeberg.org",
    "gitea.com",
];

pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git",
    "**/.git",
    "**/node_modules",
    "**/__pycache__",
    "*.pyc",
    "**/.DS_Store",
];

static COMMIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{40}$").unwrap());

/// Whole tree or a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Tree,
    Blob,
}

#[derive(Debug, Clone)]
pub struct IngestionQuery {
    /// The reference exactly as supplied.
    pub source: String,
    /// Remote clone URL; `None` for local directories.
    pub url: Option<String>,
    pub branch: Option<String>,
    pub commit: Option<String>,
    /// Always starts with `/`; `/` means the whole tree.
    pub subpath: String,
    pub kind: QueryKind,
    /// Segments after `/tree/` or `/blob/`. A branch name may span several of them.
    pub ref_segments: Vec<String>,
    pub slug: String,
    pub ignore_patterns: BTreeSet<String>,
    pub include_patterns: BTreeSet<String>,
    /// Working copy root: the clone destination, or the local directory itself.
    pub local_path: PathBuf,
}

impl IngestionQuery {
    pub fn parse(input: &str, staging_dir: &Path) -> Result<Self, IngestError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(IngestError::InvalidQuery("empty source reference".into()));
        }
        let query = if is_remote(input) {
            Self::parse_remote(input, staging_dir)?
        } else {
            Self::parse_local(input)?
        };
        info!(
            source = %query.source,
            slug = %query.slug,
            remote = query.url.is_some(),
            subpath = %query.subpath,
            "Parsed ingestion query"
        );
        Ok(query)
    }

    fn parse_remote(input: &str, staging_dir: &Path) -> Result<Self, IngestError> {
        let without_scheme = input
            .trim_start_matches("https://")
            .trim_start_matches("http://");
        let parts: Vec<&str> = without_scheme
            .split('/')
            .filter(|p| !p.is_empty())
            .collect();
        if parts.len() < 3 {
            return Err(IngestError::InvalidQuery(format!(
                "expected <host>/<owner>/<repo>, got {input}"
            )));
        }
        let host = parts[0].to_ascii_lowercase();
        let owner = parts[1];
        let repo = parts[2].trim_end_matches(".git");
        if repo.is_empty() {
            return Err(IngestError::InvalidQuery(format!("missing repository name in {input}")));
        }

        let mut kind = QueryKind::Tree;
        let mut branch = None;
        let mut commit = None;
        let mut subpath = "/".to_string();
        let mut ref_segments = Vec::new();

        if parts.len() > 3 {
            match parts[3] {
                "tree" | "blob" => {
                    if parts[3] == "blob" {
                        kind = QueryKind::Blob;
                    }
                    if let Some(reference) = parts.get(4) {
                        if COMMIT_RE.is_match(reference) {
                            commit = Some(reference.to_string());
                        } else {
                            branch = Some(reference.to_string());
                        }
                    }
                    if parts.len() > 5 {
                        subpath = format!("/{}", parts[5..].join("/"));
                    }
                    ref_segments = parts[4..].iter().map(|p| p.to_string()).collect();
                }
                other => {
                    debug!(segment = other, "Ignoring unrecognized URL segment");
                }
            }
        }

        let slug = format!("{owner}-{repo}");
        let local_path = staging_dir
            .join(uuid::Uuid::new_v4().to_string())
            .join(&slug);

        Ok(Self {
            source: input.to_string(),
            url: Some(format!("https://{host}/{owner}/{repo}")),
            branch,
            commit,
            subpath,
            kind,
            ref_segments,
            slug,
            ignore_patterns: default_ignore_patterns(),
            include_patterns: BTreeSet::new(),
            local_path,
        })
    }

    fn parse_local(input: &str) -> Result<Self, IngestError> {
        let path = Path::new(input);
        let local_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };
        let slug = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "local".to_string());

        Ok(Self {
            source: input.to_string(),
            url: None,
            branch: None,
            commit: None,
            subpath: "/".to_string(),
            kind: QueryKind::Tree,
            ref_segments: Vec::new(),
            slug,
            ignore_patterns: default_ignore_patterns(),
            include_patterns: BTreeSet::new(),
            local_path,
        })
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        if self.branch.is_none() {
            self.branch = Some(branch.into());
        }
        self
    }

    pub fn with_ignore_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_patterns
            .extend(patterns.into_iter().map(Into::into));
        self
    }

    pub fn with_include_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_patterns
            .extend(patterns.into_iter().map(Into::into));
        self
    }

    /// True when the branch was read from a URL with more segments that it may span.
    pub fn needs_branch_resolution(&self) -> bool {
        self.commit.is_none() && self.branch.is_some() && self.ref_segments.len() > 1
    }

    /// Takes the longest leading run of reference segments that names one of `heads` as
    /// the branch and the remaining segments as the subpath. Without a match the branch
    /// stays the first segment.
    pub fn resolve_branch(&mut self, heads: &[String]) {
        for taken in (1..=self.ref_segments.len()).rev() {
            let candidate = self.ref_segments[..taken].join("/");
            if !heads.iter().any(|head| *head == candidate) {
                continue;
            }
            let rest = &self.ref_segments[taken..];
            self.subpath = if rest.is_empty() {
                "/".to_string()
            } else {
                format!("/{}", rest.join("/"))
            };
            debug!(branch = %candidate, subpath = %self.subpath, "Resolved branch against remote heads");
            self.branch = Some(candidate);
            return;
        }
    }

    pub fn is_remote(&self) -> bool {
        self.url.is_some()
    }

    /// The directory or file the digest is built from.
    pub fn target_path(&self) -> PathBuf {
        let relative = self.subpath.trim_matches('/');
        if relative.is_empty() {
            self.local_path.clone()
        } else {
            self.local_path.join(relative)
        }
    }
}

fn is_remote(input: &str) -> bool {
    if input.starts_with("https://") || input.starts_with("http://") {
        return true;
    }
    let host = input.split('/').next().unwrap_or("").to_ascii_lowercase();
    KNOWN_HOSTS.contains(&host.as_str())
}

fn default_ignore_patterns() -> BTreeSet<String> {
    DEFAULT_IGNORE_PATTERNS
        .iter()
        .map(|p| p.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staging() -> PathBuf {
        PathBuf::from("/tmp/repo-digest-test")
    }

    #[test]
    fn test_parse_plain_repository_url() {
        let q = IngestionQuery::parse("https://github.com/octo/widgets.git", &staging()).unwrap();
        assert_eq!(q.url.as_deref(), Some("https://github.com/octo/widgets"));
        assert_eq!(q.slug, "octo-widgets");
        assert_eq!(q.subpath, "/");
        assert_eq!(q.kind, QueryKind::Tree);
        assert!(q.branch.is_none() && q.commit.is_none());
        assert!(q.local_path.starts_with(staging()));
        assert!(q.local_path.ends_with("octo-widgets"));
    }

    #[test]
    fn test_parse_tree_and_blob_urls() {
        struct Case {
            input: &'static str,
            branch: Option<&'static str>,
            commit: Option<&'static str>,
            subpath: &'static str,
            kind: QueryKind,
        }
        let cases = vec![
            Case {
                input: "github.com/octo/widgets/tree/dev/src/lib",
                branch: Some("dev"),
                commit: None,
                subpath: "/src/lib",
                kind: QueryKind::Tree,
            },
            Case {
                input: "https://github.com/octo/widgets/blob/main/docs/file.md",
                branch: Some("main"),
                commit: None,
                subpath: "/docs/file.md",
                kind: QueryKind::Blob,
            },
            Case {
                input: "https://gitlab.com/octo/widgets/tree/0123456789abcdef0123456789abcdef01234567",
                branch: None,
                commit: Some("0123456789abcdef0123456789abcdef01234567"),
                subpath: "/",
                kind: QueryKind::Tree,
            },
        ];
        for case in cases {
            let q = IngestionQuery::parse(case.input, &staging()).unwrap();
            assert_eq!(q.branch.as_deref(), case.branch, "{}", case.input);
            assert_eq!(q.commit.as_deref(), case.commit, "{}", case.input);
            assert_eq!(q.subpath, case.subpath, "{}", case.input);
            assert_eq!(q.kind, case.kind, "{}", case.input);
        }
    }

    #[test]
    fn test_parse_local_path() {
        let q = IngestionQuery::parse("/srv/projects/widgets", &staging()).unwrap();
        assert!(!q.is_remote());
        assert_eq!(q.slug, "widgets");
        assert_eq!(q.local_path, PathBuf::from("/srv/projects/widgets"));
        assert!(q.ignore_patterns.contains(".git"));
    }

    #[test]
    fn test_parse_rejects_incomplete_references() {
        assert!(matches!(
            IngestionQuery::parse("", &staging()),
            Err(IngestError::InvalidQuery(_))
        ));
        assert!(matches!(
            IngestionQuery::parse("https://github.com/octo", &staging()),
            Err(IngestError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_overrides_do_not_replace_parsed_branch() {
        let q = IngestionQuery::parse("github.com/octo/widgets/tree/dev", &staging())
            .unwrap()
            .with_branch("feature")
            .with_ignore_patterns(["*.log"])
            .with_include_patterns(vec!["src/*".to_string()]);
        assert_eq!(q.branch.as_deref(), Some("dev"));
        assert!(q.ignore_patterns.contains("*.log"));
        assert!(q.include_patterns.contains("src/*"));
    }

    #[test]
    fn test_resolve_branch_takes_longest_matching_head() {
        struct Case {
            input: &'static str,
            heads: Vec<&'static str>,
            branch: &'static str,
            subpath: &'static str,
        }
        let cases = vec![
            Case {
                input: "https://github.com/o/r/tree/feature/x/src",
                heads: vec!["main", "feature", "feature/x"],
                branch: "feature/x",
                subpath: "/src",
            },
            Case {
                input: "https://github.com/o/r/blob/release/2.0/docs/a.md",
                heads: vec!["release/2.0"],
                branch: "release/2.0",
                subpath: "/docs/a.md",
            },
            Case {
                input: "https://github.com/o/r/tree/feature/x",
                heads: vec!["feature/x"],
                branch: "feature/x",
                subpath: "/",
            },
            Case {
                input: "https://github.com/o/r/tree/dev/src",
                heads: vec!["main"],
                branch: "dev",
                subpath: "/src",
            },
        ];
        for case in cases {
            let mut q = IngestionQuery::parse(case.input, &staging()).unwrap();
            assert!(q.needs_branch_resolution(), "{}", case.input);
            let heads: Vec<String> = case.heads.iter().map(|h| h.to_string()).collect();
            q.resolve_branch(&heads);
            assert_eq!(q.branch.as_deref(), Some(case.branch), "{}", case.input);
            assert_eq!(q.subpath, case.subpath, "{}", case.input);
        }
    }

    #[test]
    fn test_single_segment_and_commit_refs_need_no_resolution() {
        let q = IngestionQuery::parse("https://github.com/o/r/tree/dev", &staging()).unwrap();
        assert!(!q.needs_branch_resolution());
        let q = IngestionQuery::parse(
            "https://github.com/o/r/tree/0123456789abcdef0123456789abcdef01234567/src",
            &staging(),
        )
        .unwrap();
        assert!(!q.needs_branch_resolution());
    }

    #[test]
    fn test_target_path_joins_subpath() {
        let mut q = IngestionQuery::parse("/srv/w", &staging()).unwrap();
        q.subpath = "/docs/".to_string();
        assert_eq!(q.target_path(), PathBuf::from("/srv/w/docs"));
    }
}
