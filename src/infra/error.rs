//! Error types for signing, verification and timestamping.
//!
//! Every variant renders as a single line so the binary can report it on the
//! info channel unchanged.

use thiserror::Error;

/// Result type for signer operations
pub type SignerResult<T> = Result<T, SignerError>;

/// Error taxonomy shared by every layer of the crate
#[derive(Error, Debug, miette::Diagnostic)]
pub enum SignerError {
    #[error("No certificate found for '{0}'")]
    SignerNotFound(String),

    #[error("Certificate for '{0}' has no usable private key")]
    SignerLacksPrivateKey(String),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid armor: {0}")]
    InvalidArmor(String),

    #[error("Unable to decode signed data: {0}")]
    DecodeFailure(String),

    #[error("Signature is invalid: {0}")]
    SignatureInvalid(String),

    #[error("Timestamp is invalid: {0}")]
    TimestampInvalid(String),

    #[error("Timestamp authority failed with HTTP status {status}: {reason}")]
    TimestampAuthorityError { status: u16, reason: String },

    #[error("Timestamping requires exactly one signer, found {0}")]
    MultipleSignersUnsupported(usize),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Input unavailable: {0}")]
    InputUnavailable(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Output channel write failed: {0}")]
    OutputError(String),

    #[error("ASN.1 encoding/decoding error: {0}")]
    Asn1Error(String),

    #[error("Cryptographic error: {0}")]
    CryptographicError(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}

impl From<der::Error> for SignerError {
    fn from(error: der::Error) -> Self {
        SignerError::Asn1Error(error.to_string())
    }
}

impl From<reqwest::Error> for SignerError {
    fn from(error: reqwest::Error) -> Self {
        SignerError::NetworkError(error.to_string())
    }
}

impl From<std::io::Error> for SignerError {
    fn from(error: std::io::Error) -> Self {
        SignerError::IoError(error.to_string())
    }
}

impl From<openssl::error::ErrorStack> for SignerError {
    fn from(error: openssl::error::ErrorStack) -> Self {
        // ErrorStack's Display joins entries without newlines already
        SignerError::CryptographicError(error.to_string())
    }
}

impl SignerError {
    /// Renders the error the way the binary reports it on the info channel.
    #[must_use]
    pub fn single_line(&self) -> String {
        self.to_string().replace(['\r', '\n'], " ")
    }
}
