//! Existence probe: a HEAD request that tells whether a remote repository can be cloned.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::redirect::Policy;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::contract::RepositoryProbe;
use crate::error::AcquireError;
use crate::redact::{AccessToken, Redactor};

pub const PROVIDER_HOST: &str = "github.com";

/// Probes over HTTP. When a token is configured and the URL belongs to the provider,
/// the provider's repository API is asked instead of the web URL.
pub struct HttpProbe {
    client: reqwest::Client,
    token: Option<AccessToken>,
    api_base: String,
    redactor: Redactor,
}

impl HttpProbe {
    pub fn new(settings: &Settings) -> Self {
        // Redirects must stay visible: 301 and 302 mean different things here.
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .user_agent(concat!("repo-digest/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build probe HTTP client, using defaults");
                reqwest::Client::new()
            });
        Self {
            client,
            token: settings.access_token.clone(),
            api_base: settings.github_api_base.trim_end_matches('/').to_string(),
            redactor: settings.redactor(),
        }
    }
}

#[async_trait]
impl RepositoryProbe for HttpProbe {
    async fn exists(&self, url: &str) -> Result<bool, AcquireError> {
        let provider_token = self.token.as_ref().filter(|_| is_provider_url(url));

        let request = match provider_token {
            Some(token) => {
                let header = format!("token {}", token.expose());
                match provider_api_url(&self.api_base, url) {
                    Some(api_url) => {
                        info!(api_url = %api_url, "[PROBE] Using provider API with access token");
                        self.client.head(api_url).header(AUTHORIZATION, header)
                    }
                    None => {
                        warn!(url = %url, "[PROBE] Could not parse owner/repo from provider URL");
                        self.client.head(url).header(AUTHORIZATION, header)
                    }
                }
            }
            None => {
                debug!(url = %url, "[PROBE] Probing URL without credentials");
                self.client.head(url)
            }
        };

        match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                info!(url = %url, status, "[PROBE] Received probe response");
                interpret_status(status, provider_token.is_some(), url)
            }
            Err(e) => {
                warn!(
                    url = %url,
                    error = %self.redactor.redact(&e.to_string()),
                    "[PROBE] Probe request failed, treating repository as unreachable"
                );
                Ok(false)
            }
        }
    }
}

/// Maps a probe status to reachability.
///
/// With a token, 404/302 are reported as reachable: provider APIs hide private
/// repositories behind those answers, so the clone makes the final call.
pub fn interpret_status(status: u16, token_configured: bool, url: &str) -> Result<bool, AcquireError> {
    match status {
        200 | 301 => Ok(true),
        302 | 404 => {
            if token_configured {
                info!(status, "[PROBE] Deferring access check to clone since a token is configured");
                Ok(true)
            } else {
                Ok(false)
            }
        }
        other => Err(AcquireError::UnexpectedStatus {
            url: url.to_string(),
            status: other,
        }),
    }
}

pub fn is_provider_url(url: &str) -> bool {
    host_of(url).is_some_and(|host| host.eq_ignore_ascii_case(PROVIDER_HOST))
}

/// `<api_base>/repos/<owner>/<repo>` for a provider web URL.
pub fn provider_api_url(api_base: &str, url: &str) -> Option<String> {
    let rest = strip_scheme(url);
    let mut parts = rest.split('/').filter(|p| !p.is_empty());
    let _host = parts.next()?;
    let owner = parts.next()?;
    let repo = parts.next()?.trim_end_matches(".git");
    if repo.is_empty() {
        return None;
    }
    Some(format!(
        "{}/repos/{owner}/{repo}",
        api_base.trim_end_matches('/')
    ))
}

fn strip_scheme(url: &str) -> &str {
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url)
}

fn host_of(url: &str) -> Option<&str> {
    let host = strip_scheme(url).split('/').next()?;
    // Drop userinfo and port.
    let host = host.rsplit('@').next()?;
    host.split(':').next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpret_status_table() {
        struct Case {
            status: u16,
            token: bool,
            expected: Option<bool>,
        }
        let cases = vec![
            Case { status: 200, token: false, expected: Some(true) },
            Case { status: 301, token: false, expected: Some(true) },
            Case { status: 404, token: false, expected: Some(false) },
            Case { status: 302, token: false, expected: Some(false) },
            Case { status: 404, token: true, expected: Some(true) },
            Case { status: 302, token: true, expected: Some(true) },
            Case { status: 500, token: false, expected: None },
            Case { status: 403, token: true, expected: None },
        ];
        for case in cases {
            let result = interpret_status(case.status, case.token, "https://github.com/o/r");
            match case.expected {
                Some(expected) => assert_eq!(
                    result.unwrap(),
                    expected,
                    "status {} token {}",
                    case.status,
                    case.token
                ),
                None => assert!(
                    matches!(result, Err(AcquireError::UnexpectedStatus { status, .. }) if status == case.status),
                    "status {} should be a protocol error",
                    case.status
                ),
            }
        }
    }

    #[test]
    fn test_provider_api_url() {
        assert_eq!(
            provider_api_url("https://api.github.com", "https://github.com/octo/widgets.git").as_deref(),
            Some("https://api.github.com/repos/octo/widgets")
        );
        assert_eq!(provider_api_url("https://api.github.com/", "https://github.com/octo"), None);
    }

    #[test]
    fn test_is_provider_url() {
        assert!(is_provider_url("https://github.com/octo/widgets"));
        assert!(is_provider_url("https://user@GitHub.com:443/octo/widgets"));
        assert!(!is_provider_url("https://gitlab.com/octo/widgets"));
        assert!(!is_provider_url("http://127.0.0.1:8080/octo/widgets"));
    }
}
