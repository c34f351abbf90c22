//! User-profile configuration.
//!
//! An optional `~/.smimesignerconfig` INI file supplies settings the calling
//! tool never passes on the command line:
//!
//! ```ini
//! [Certificate]
//! TimeAuthorityUrl = http://timestamp.digicert.com
//! ```
//!
//! A missing, unreadable or unparsable file counts as "no configuration".
//! The one exception is a malformed `TimeAuthorityUrl`, which is fatal so a
//! user-chosen authority is never silently replaced.

use crate::domain::types::TimestampUrl;
use crate::infra::error::{SignerError, SignerResult};
use ini::Ini;
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up in the home directory.
pub const CONFIG_FILE_NAME: &str = ".smimesignerconfig";

/// Environment variable overriding the certificate store directory.
pub const STORE_ENV_VAR: &str = "SMIME_SIGNER_STORE";

/// Section holding certificate settings.
pub const CERTIFICATE_SECTION: &str = "Certificate";

/// RFC 3161 authority used when `--timestamp-authority` is not given.
pub const TIME_AUTHORITY_KEY: &str = "TimeAuthorityUrl";

/// Settings extracted from a valid configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileSettings {
    pub time_authority: Option<TimestampUrl>,
}

/// Configuration manager for the user-profile file
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Manager for `~/.smimesignerconfig`.
    pub fn new() -> SignerResult<Self> {
        Ok(Self {
            config_path: Self::default_config_path()?,
        })
    }

    /// Create a configuration manager with custom path
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    /// `<home>/.smimesignerconfig`
    pub fn default_config_path() -> SignerResult<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(CONFIG_FILE_NAME))
            .ok_or_else(|| {
                SignerError::ConfigurationError("unable to locate the home directory".into())
            })
    }

    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Loads the profile settings.
    ///
    /// Returns `Ok(None)` when the file is absent or cannot be read or parsed.
    pub fn load(&self) -> SignerResult<Option<ProfileSettings>> {
        if !self.config_path.exists() {
            return Ok(None);
        }

        let content = match fs::read_to_string(&self.config_path) {
            Ok(content) => content,
            Err(e) => {
                log::warn!(
                    "ignoring unreadable config file {}: {e}",
                    self.config_path.display()
                );
                return Ok(None);
            }
        };
        let config = match Ini::load_from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                log::warn!(
                    "ignoring malformed config file {}: {e}",
                    self.config_path.display()
                );
                return Ok(None);
            }
        };

        let time_authority = match config.get_from(Some(CERTIFICATE_SECTION), TIME_AUTHORITY_KEY) {
            Some(url) if !url.trim().is_empty() => Some(TimestampUrl::new(url).map_err(|_| {
                SignerError::ConfigurationError(format!(
                    "the timestamp authority is not a valid URL inside configuration file: {}",
                    self.config_path.display()
                ))
            })?),
            _ => None,
        };

        log::debug!("loaded configuration from {}", self.config_path.display());
        Ok(Some(ProfileSettings { time_authority }))
    }
}

/// Decides which timestamp authority a sign operation uses.
///
/// * `Some("")` (or whitespace) disables timestamping.
/// * `Some(url)` uses `url`, which must be a valid http(s) URL.
/// * `None` falls back to the configuration file, then the public default.
pub fn resolve_timestamp_authority(
    cli_value: Option<&str>,
    config: &ConfigManager,
) -> SignerResult<Option<TimestampUrl>> {
    match cli_value {
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => TimestampUrl::new(value).map(Some),
        None => match config.load()?.and_then(|settings| settings.time_authority) {
            Some(url) => Ok(Some(url)),
            None => TimestampUrl::default_authority().map(Some),
        },
    }
}

/// Directory holding certificate bundles.
///
/// Explicit path, then `SMIME_SIGNER_STORE`, then `<config_dir>/smime-signer/certs`.
pub fn resolve_store_dir(explicit: Option<&Path>) -> SignerResult<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(STORE_ENV_VAR).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    dirs::config_dir()
        .map(|dir| dir.join("smime-signer").join("certs"))
        .ok_or_else(|| {
            SignerError::ConfigurationError(
                "no certificate store configured and no config directory available".into(),
            )
        })
}
