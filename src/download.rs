//! Repository acquisition: probe, clone, and optional sparse/commit checkout.
//!
//! Every git invocation is first built as a plain argument list ([`GitCommand`]) so the
//! exact command can be inspected in tests and logged once through the [`Redactor`].

use std::path::Path;
use std::process::{Output, Stdio};

use tokio::process::Command;
use tracing::{error, info};

use crate::config::Settings;
use crate::contract::{CloneConfig, RepositoryProbe};
use crate::error::AcquireError;
use crate::probe::PROVIDER_HOST;
use crate::redact::{AccessToken, Redactor};

/// Branch names git resolves on its own; never passed with `--branch`.
const DEFAULT_BRANCHES: &[&str] = &["main", "master"];

/// An immutable `git` argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCommand {
    pub args: Vec<String>,
}

impl GitCommand {
    fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn display(&self, redactor: &Redactor) -> String {
        redactor.redact_command("git", &self.args)
    }
}

/// `git clone` for the given configuration.
pub fn clone_command(config: &CloneConfig, token: Option<&AccessToken>) -> GitCommand {
    let mut args: Vec<String> = vec!["clone".into(), "--single-branch".into()];

    if config.partial_clone() {
        args.push("--filter=blob:none".into());
        args.push("--sparse".into());
    }

    if config.commit.is_none() {
        args.push("--depth=1".into());
        if let Some(branch) = &config.branch {
            let lowered = branch.to_ascii_lowercase();
            if !DEFAULT_BRANCHES.contains(&lowered.as_str()) {
                args.push("--branch".into());
                args.push(branch.clone());
            }
        }
    }

    args.push(authenticated_url(&config.url, token));
    args.push(config.local_path.to_string_lossy().into_owned());
    GitCommand { args }
}

/// Embeds the token in provider HTTPS URLs, which is how the provider accepts
/// token auth over HTTPS. Other URLs are returned unchanged.
pub fn authenticated_url(url: &str, token: Option<&AccessToken>) -> String {
    let prefix = format!("https://{PROVIDER_HOST}/");
    match token {
        Some(token) if url.starts_with(&prefix) => {
            let mut with_token = url.replacen(
                "https://",
                &format!("https://{}@", token.url_encoded()),
                1,
            );
            if !with_token.ends_with(".git") {
                with_token.push_str(".git");
            }
            with_token
        }
        _ => url.to_string(),
    }
}

/// The path handed to `sparse-checkout set`, if partial clone mode is on.
///
/// For single-file references the file name is dropped so its directory is kept.
pub fn sparse_checkout_path(config: &CloneConfig) -> Option<String> {
    if !config.partial_clone() {
        return None;
    }
    let subpath = config.subpath.trim_start_matches('/').trim_end_matches('/');
    if !config.blob {
        return Some(subpath.to_string());
    }
    let parent = match subpath.rsplit_once('/') {
        Some((parent, _file)) => parent,
        None => ".",
    };
    Some(parent.to_string())
}

/// Follow-up commands run inside the fresh working copy.
pub fn checkout_commands(config: &CloneConfig) -> Vec<GitCommand> {
    let dest = config.local_path.to_string_lossy().into_owned();
    let mut commands = Vec::new();
    if let Some(path) = sparse_checkout_path(config) {
        commands.push(GitCommand::new(["-C", dest.as_str(), "sparse-checkout", "set", path.as_str()]));
    }
    if let Some(commit) = &config.commit {
        commands.push(GitCommand::new(["-C", dest.as_str(), "checkout", commit.as_str()]));
    }
    commands
}

/// `git ls-remote --heads`, authenticated the same way as the clone.
pub fn remote_branches_command(url: &str, token: Option<&AccessToken>) -> GitCommand {
    GitCommand::new([
        "ls-remote".to_string(),
        "--heads".to_string(),
        authenticated_url(url, token),
    ])
}

/// Branch names from `git ls-remote --heads` output.
pub fn parse_remote_heads(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.split_once("refs/heads/"))
        .map(|(_, name)| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Lists the branch heads of `url`, bounded by the acquisition deadline.
pub async fn fetch_remote_branches(url: &str, settings: &Settings) -> Result<Vec<String>, AcquireError> {
    let redactor = settings.redactor();
    let command = remote_branches_command(url, settings.access_token.as_ref());
    let deadline = settings.clone_timeout();
    let output = match tokio::time::timeout(deadline, run_command("git", &command.args, &redactor)).await {
        Ok(result) => result?,
        Err(_) => {
            error!(url = %redactor.redact(url), timeout = ?deadline, "[CLONE] Listing remote branches timed out");
            return Err(AcquireError::Timeout(deadline));
        }
    };
    let heads = parse_remote_heads(&String::from_utf8_lossy(&output.stdout));
    info!(url = %redactor.redact(url), heads = heads.len(), "[CLONE] Listed remote branches");
    Ok(heads)
}

/// Runs a command to completion. Non-zero exit becomes [`AcquireError::ToolExecution`]
/// with redacted stderr. The child is killed if the returned future is dropped.
pub async fn run_command(
    program: &str,
    args: &[String],
    redactor: &Redactor,
) -> Result<Output, AcquireError> {
    let shown = redactor.redact_command(program, args);
    info!(command = %shown, "[CLONE] Running command");

    let output = Command::new(program)
        .args(args)
        // Never block on an interactive credential prompt.
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            error!(command = %shown, error = %e, "[CLONE] Failed to launch command");
            AcquireError::ToolExecution {
                command: shown.clone(),
                stderr: redactor.redact(&e.to_string()),
            }
        })?;

    if !output.status.success() {
        let stderr = redactor.redact(String::from_utf8_lossy(&output.stderr).trim());
        error!(
            command = %shown,
            status = ?output.status.code(),
            stderr = %stderr,
            "[CLONE] Command exited with non-zero status"
        );
        return Err(AcquireError::ToolExecution {
            command: shown,
            stderr,
        });
    }
    Ok(output)
}

/// Materializes working copies with the `git` binary.
pub struct GitAcquirer<'a, P: RepositoryProbe + ?Sized> {
    settings: &'a Settings,
    probe: &'a P,
    redactor: Redactor,
}

impl<'a, P: RepositoryProbe + ?Sized> GitAcquirer<'a, P> {
    pub fn new(settings: &'a Settings, probe: &'a P) -> Self {
        Self {
            settings,
            probe,
            redactor: settings.redactor(),
        }
    }

    /// Clones `config.url` into `config.local_path`, bounded by the configured deadline.
    /// A failed or timed-out attempt leaves whatever was written in place.
    pub async fn acquire(&self, config: &CloneConfig) -> Result<(), AcquireError> {
        let url = self.redactor.redact(&config.url);
        info!(
            url = %url,
            path = %config.local_path.display(),
            "[CLONE] Starting clone of repository"
        );

        if let Some(parent) = config.local_path.parent() {
            ensure_dir(parent)?;
        }

        let deadline = self.settings.clone_timeout();
        match tokio::time::timeout(deadline, self.clone_and_checkout(config)).await {
            Ok(result) => result,
            Err(_) => {
                error!(url = %url, timeout = ?deadline, "[CLONE] Acquisition deadline exceeded");
                Err(AcquireError::Timeout(deadline))
            }
        }
    }

    async fn clone_and_checkout(&self, config: &CloneConfig) -> Result<(), AcquireError> {
        if !self.probe.exists(&config.url).await? {
            return Err(AcquireError::NotFound(format!(
                "{} (make sure it is public or that a valid access token is configured)",
                self.redactor.redact(&config.url)
            )));
        }

        ensure_git_installed(&self.redactor).await?;

        let clone = clone_command(config, self.settings.access_token.as_ref());
        run_command("git", &clone.args, &self.redactor).await?;
        info!(path = %config.local_path.display(), "[CLONE] Repository cloned successfully");

        for command in checkout_commands(config) {
            run_command("git", &command.args, &self.redactor).await?;
        }
        if config.commit.is_some() || config.partial_clone() {
            info!(
                commit = config.commit.as_deref().unwrap_or(""),
                subpath = %config.subpath,
                "[CLONE] Checkout completed successfully"
            );
        }
        Ok(())
    }
}

async fn ensure_git_installed(redactor: &Redactor) -> Result<(), AcquireError> {
    run_command("git", &["--version".to_string()], redactor)
        .await
        .map(|_| ())
        .map_err(|e| match e {
            AcquireError::ToolExecution { command, stderr } => AcquireError::ToolExecution {
                command,
                stderr: format!("Git is not installed or not accessible: {stderr}"),
            },
            other => other,
        })
}

fn ensure_dir(path: &Path) -> Result<(), AcquireError> {
    match std::fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => {
            error!(error = ?e, path = %path.display(), "[CLONE] Failed to create parent directory");
            Err(AcquireError::Filesystem {
                path: path.to_path_buf(),
                source: e,
            })
        }
    }
}
