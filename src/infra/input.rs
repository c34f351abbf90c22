//! Input sources for the sign and verify paths.
//!
//! A missing path or `-` means standard input, which must be redirected.

use crate::infra::error::{SignerError, SignerResult};
use std::io::{IsTerminal, Read};
use std::path::PathBuf;

/// Where bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Stdin,
    File(PathBuf),
}

impl InputSource {
    /// Interprets a positional argument; `None`, empty and `-` are stdin.
    #[must_use]
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            None | Some("" | "-") => Self::Stdin,
            Some(path) => Self::File(PathBuf::from(path)),
        }
    }

    /// Reads the whole source.
    pub fn read_all(&self) -> SignerResult<Vec<u8>> {
        match self {
            Self::Stdin => {
                let stdin = std::io::stdin();
                if stdin.is_terminal() {
                    return Err(SignerError::InputUnavailable(
                        "standard input is not redirected".into(),
                    ));
                }
                let mut buf = Vec::new();
                stdin.lock().read_to_end(&mut buf)?;
                Ok(buf)
            }
            Self::File(path) => std::fs::read(path).map_err(|e| {
                SignerError::InputUnavailable(format!("{}: {e}", path.display()))
            }),
        }
    }
}

impl std::fmt::Display for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdin => f.write_str("<stdin>"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn dash_and_absent_mean_stdin() {
        assert_eq!(InputSource::from_arg(None), InputSource::Stdin);
        assert_eq!(InputSource::from_arg(Some("-")), InputSource::Stdin);
        assert_eq!(InputSource::from_arg(Some("")), InputSource::Stdin);
        assert_eq!(
            InputSource::from_arg(Some("sig.p7s")),
            InputSource::File(PathBuf::from("sig.p7s"))
        );
    }

    #[test]
    fn reads_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"payload").unwrap();
        let source = InputSource::File(file.path().to_path_buf());
        assert_eq!(source.read_all().unwrap(), b"payload");
    }

    #[test]
    fn missing_file_is_unavailable() {
        let source = InputSource::File(PathBuf::from("/definitely/not/here.sig"));
        assert!(matches!(
            source.read_all(),
            Err(SignerError::InputUnavailable(_))
        ));
    }
}
