//! Validated value types passed between the CLI and the workflows.

use crate::infra::error::{SignerError, SignerResult};
use std::fmt;
use std::str::FromStr;

/// Public RFC 3161 authority used when neither the command line nor the
/// configuration file names one.
pub const DEFAULT_TIMESTAMP_AUTHORITY: &str = "http://timestamp.digicert.com";

/// Type-safe wrapper for an RFC 3161 timestamp authority URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampUrl(reqwest::Url);

impl TimestampUrl {
    /// Create a new `TimestampUrl` after validation
    pub fn new(url: impl AsRef<str>) -> SignerResult<Self> {
        let raw = url.as_ref().trim();
        let parsed = reqwest::Url::parse(raw).map_err(|e| {
            SignerError::ConfigurationError(format!(
                "Timestamp authority '{raw}' is not an absolute URL: {e}"
            ))
        })?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(SignerError::ConfigurationError(format!(
                    "Timestamp authority must use http or https, got '{other}'"
                )))
            }
        }
        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(SignerError::ConfigurationError(format!(
                "Timestamp authority '{raw}' has no host"
            )));
        }
        Ok(Self(parsed))
    }

    /// The public default authority.
    pub fn default_authority() -> SignerResult<Self> {
        Self::new(DEFAULT_TIMESTAMP_AUTHORITY)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    #[must_use]
    pub fn as_url(&self) -> &reqwest::Url {
        &self.0
    }
}

impl FromStr for TimestampUrl {
    type Err = SignerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for TimestampUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the caller names the signing certificate (`--local-user`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityToken {
    /// Lower-cased e-mail address.
    Email(String),
    /// Upper-cased hex fingerprint with separators removed.
    Fingerprint(String),
}

impl IdentityToken {
    /// Classifies a raw `--local-user` value.
    ///
    /// Anything containing `@` is an e-mail address; a `Display Name <addr>`
    /// form is reduced to `addr`. Everything else is treated as a
    /// certificate fingerprint.
    pub fn parse(raw: &str) -> SignerResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SignerError::InvalidArgument(
                "a signing identity (--local-user) is required".to_string(),
            ));
        }

        if trimmed.contains('@') {
            let address = match (trimmed.rfind('<'), trimmed.rfind('>')) {
                (Some(open), Some(close)) if open < close => &trimmed[open + 1..close],
                _ => trimmed,
            };
            return Ok(Self::Email(address.trim().to_ascii_lowercase()));
        }

        let normalised = trimmed
            .chars()
            .filter(|c| !matches!(c, ' ' | ':'))
            .collect::<String>()
            .to_ascii_uppercase();
        let fingerprint = normalised.strip_prefix("0X").unwrap_or(&normalised);
        Ok(Self::Fingerprint(fingerprint.to_string()))
    }

    /// The original form used in error messages.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Email(s) | Self::Fingerprint(s) => s,
        }
    }
}

impl FromStr for IdentityToken {
    type Err = SignerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
