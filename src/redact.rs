//! Access token handling.
//!
//! The token is read once at startup and only ever leaves this module through
//! [`AccessToken::expose`] (for the probe header and the clone URL). Everything that is
//! logged or returned as an error goes through [`Redactor::redact`] first.

use std::fmt;

const MASK: &str = "*****";

/// A personal access token for the recognized git provider.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Returns `None` for an empty or whitespace-only token.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.len() < 10 {
            tracing::warn!("Access token appears to be invalid (too short)");
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Percent-encoded form used when the token is embedded in a URL.
    pub fn url_encoded(&self) -> String {
        urlencoding::encode(&self.0).into_owned()
    }

    /// Last four characters, for "token detected" log lines.
    pub fn hint(&self) -> String {
        let tail: String = self
            .0
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("{MASK}{tail}")
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(")?;
        f.write_str(MASK)?;
        f.write_str(")")
    }
}

/// Masks every occurrence of the configured token (raw and URL-encoded).
#[derive(Debug, Clone, Default)]
pub struct Redactor {
    needles: Vec<String>,
}

impl Redactor {
    pub fn new(token: Option<&AccessToken>) -> Self {
        let mut needles = Vec::new();
        if let Some(token) = token {
            let encoded = token.url_encoded();
            // Longest first so the encoded form is not half-masked by the raw one.
            if encoded != token.expose() {
                needles.push(encoded);
            }
            needles.push(token.expose().to_string());
            needles.sort_by_key(|n| std::cmp::Reverse(n.len()));
        }
        Self { needles }
    }

    pub fn redact(&self, text: &str) -> String {
        let mut out = text.to_string();
        for needle in &self.needles {
            out = out.replace(needle.as_str(), MASK);
        }
        out
    }

    /// Redacts and joins an argument list for logs and error messages.
    pub fn redact_command(&self, program: &str, args: &[String]) -> String {
        let mut line = String::from(program);
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        self.redact(&line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_masks_raw_and_encoded_token() {
        let token = AccessToken::new("ghp_abc/def+ghi1234").unwrap();
        let redactor = Redactor::new(Some(&token));
        let text = format!(
            "https://{}@github.com/x/y.git and {}",
            token.url_encoded(),
            token.expose()
        );
        let redacted = redactor.redact(&text);
        assert!(!redacted.contains("ghp_abc"), "got {redacted}");
        assert_eq!(redacted, "https://*****@github.com/x/y.git and *****");
    }

    #[test]
    fn test_redactor_without_token_is_identity() {
        let redactor = Redactor::new(None);
        assert_eq!(redactor.redact("git clone https://x"), "git clone https://x");
    }

    #[test]
    fn test_debug_never_prints_token() {
        let token = AccessToken::new("ghp_secretvalue99").unwrap();
        let printed = format!("{token:?}");
        assert!(!printed.contains("secret"));
        assert_eq!(token.hint(), "*****ue99");
    }

    #[test]
    fn test_blank_token_is_none() {
        assert!(AccessToken::new("   ").is_none());
    }
}
