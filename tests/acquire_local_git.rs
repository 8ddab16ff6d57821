mod common;

use std::fs;
use std::path::Path;
use std::process::Command;

use common::git_available;
use repo_digest::contract::MockRepositoryProbe;
use repo_digest::download::{fetch_remote_branches, GitAcquirer};
use repo_digest::{CloneConfig, IngestionQuery, Ingestor, Settings};

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["-c", "user.name=Digest Test", "-c", "user.email=digest@example.com"])
        .args(args)
        .output()
        .expect("run git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// An origin repository with two commits; returns the first commit's id.
fn make_origin(dir: &Path) -> String {
    fs::create_dir_all(dir.join("docs")).unwrap();
    git(dir, &["init", "--quiet"]);
    fs::write(dir.join("README.md"), "v1\n").unwrap();
    fs::write(dir.join("docs/file.md"), "docs\n").unwrap();
    git(dir, &["add", "."]);
    git(dir, &["commit", "--quiet", "-m", "first"]);
    let first = git(dir, &["rev-parse", "HEAD"]);
    fs::write(dir.join("README.md"), "v2\n").unwrap();
    git(dir, &["commit", "--quiet", "-am", "second"]);
    first
}

fn reachable_probe() -> MockRepositoryProbe {
    let mut probe = MockRepositoryProbe::new();
    probe.expect_exists().returning(|_| Ok(true));
    probe
}

#[tokio::test]
async fn test_clone_then_checkout_commit() {
    if !git_available() {
        eprintln!("git is not available, skipping");
        return;
    }
    let origin = tempfile::tempdir().unwrap();
    let first = make_origin(origin.path());
    let staging = tempfile::tempdir().unwrap();

    let config = CloneConfig {
        url: format!("file://{}", origin.path().display()),
        local_path: staging.path().join("run").join("origin"),
        commit: Some(first),
        branch: None,
        subpath: "/".into(),
        blob: false,
    };
    let settings = Settings::default();
    let probe = reachable_probe();
    GitAcquirer::new(&settings, &probe)
        .acquire(&config)
        .await
        .unwrap();

    let readme = fs::read_to_string(config.local_path.join("README.md")).unwrap();
    assert_eq!(readme, "v1\n");
}

#[tokio::test]
async fn test_sparse_clone_of_subdirectory() {
    if !git_available() {
        eprintln!("git is not available, skipping");
        return;
    }
    let origin = tempfile::tempdir().unwrap();
    make_origin(origin.path());
    let staging = tempfile::tempdir().unwrap();

    let config = CloneConfig {
        url: format!("file://{}", origin.path().display()),
        local_path: staging.path().join("run").join("origin"),
        commit: None,
        branch: None,
        subpath: "/docs".into(),
        blob: false,
    };
    let settings = Settings::default();
    let probe = reachable_probe();
    GitAcquirer::new(&settings, &probe)
        .acquire(&config)
        .await
        .unwrap();

    assert_eq!(
        fs::read_to_string(config.local_path.join("docs/file.md")).unwrap(),
        "docs\n"
    );
}

#[tokio::test]
async fn test_failed_clone_surfaces_tool_error() {
    if !git_available() {
        eprintln!("git is not available, skipping");
        return;
    }
    let staging = tempfile::tempdir().unwrap();
    let config = CloneConfig {
        url: format!("file://{}/no-such-repo", staging.path().display()),
        local_path: staging.path().join("run").join("missing"),
        commit: None,
        branch: None,
        subpath: "/".into(),
        blob: false,
    };
    let settings = Settings::default();
    let probe = reachable_probe();
    let err = GitAcquirer::new(&settings, &probe)
        .acquire(&config)
        .await
        .unwrap_err();
    assert!(
        matches!(err, repo_digest::AcquireError::ToolExecution { .. }),
        "{err:?}"
    );
}

#[tokio::test]
async fn test_remote_ingestion_end_to_end_removes_staging() {
    if !git_available() {
        eprintln!("git is not available, skipping");
        return;
    }
    let origin = tempfile::tempdir().unwrap();
    make_origin(origin.path());
    let staging = tempfile::tempdir().unwrap();
    let run_dir = staging.path().join("run-1");

    let mut query =
        IngestionQuery::parse(&origin.path().to_string_lossy(), staging.path()).unwrap();
    query.url = Some(format!("file://{}", origin.path().display()));
    query.local_path = run_dir.join("origin");

    let settings = Settings {
        staging_dir: staging.path().to_path_buf(),
        ..Settings::default()
    };
    let probe = reachable_probe();
    let result = Ingestor::new(&settings, &probe).ingest(query).await.unwrap();

    assert!(result.summary.starts_with("Repository: "));
    assert!(result.summary.contains("Files analyzed: 2"));
    assert!(result.content.contains("FILE: docs/file.md"));
    assert!(result.content.contains("v2\n"));
    assert!(!result.tree.contains(".git"));
    assert!(!run_dir.exists());
}

#[tokio::test]
async fn test_slash_branch_is_resolved_from_remote_heads() {
    if !git_available() {
        eprintln!("git is not available, skipping");
        return;
    }
    let origin = tempfile::tempdir().unwrap();
    make_origin(origin.path());
    git(origin.path(), &["branch", "feature/x"]);

    let heads = fetch_remote_branches(
        &format!("file://{}", origin.path().display()),
        &Settings::default(),
    )
    .await
    .unwrap();
    assert!(heads.iter().any(|h| h == "feature/x"), "{heads:?}");

    let mut query = IngestionQuery::parse(
        "https://github.com/octo/widgets/tree/feature/x/docs",
        Path::new("/tmp/unused"),
    )
    .unwrap();
    assert_eq!(query.branch.as_deref(), Some("feature"));
    query.resolve_branch(&heads);
    assert_eq!(query.branch.as_deref(), Some("feature/x"));
    assert_eq!(query.subpath, "/docs");
}
