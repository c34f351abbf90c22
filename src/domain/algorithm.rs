//! Signature and digest algorithm identification.
//!
//! `AlgorithmCodes` maps a certificate's signature-algorithm OID onto the
//! OpenPGP numeric codes reported in `SIG_CREATED`. `DigestAlgorithm` covers
//! the CMS digest algorithms this crate can compute and verify.

use crate::domain::constants::{
    ECDSA_WITH_SHA1, ECDSA_WITH_SHA256, ECDSA_WITH_SHA384, ECDSA_WITH_SHA512, ID_SHA1, ID_SHA256,
    ID_SHA384, ID_SHA512, SHA1_WITH_RSA, SHA256_WITH_RSA, SHA384_WITH_RSA, SHA512_WITH_RSA,
};
use crate::infra::error::{SignerError, SignerResult};
use const_oid::ObjectIdentifier;
use sha2::{Digest, Sha256, Sha384, Sha512};

/// OpenPGP public-key algorithm code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicKeyCode {
    Rsa,
    Ecdsa,
}

impl PublicKeyCode {
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Rsa => 1,
            Self::Ecdsa => 19,
        }
    }
}

/// OpenPGP hash algorithm code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashCode {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashCode {
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Sha1 => 2,
            Self::Sha256 => 8,
            Self::Sha384 => 9,
            Self::Sha512 => 10,
        }
    }
}

/// `(pubkey-algorithm, hash)` pair for a signature algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlgorithmCodes {
    pub public_key: PublicKeyCode,
    pub hash: HashCode,
}

const SIGNATURE_ALGORITHMS: [(ObjectIdentifier, PublicKeyCode, HashCode); 8] = [
    (ECDSA_WITH_SHA1, PublicKeyCode::Ecdsa, HashCode::Sha1),
    (SHA1_WITH_RSA, PublicKeyCode::Rsa, HashCode::Sha1),
    (ECDSA_WITH_SHA256, PublicKeyCode::Ecdsa, HashCode::Sha256),
    (SHA256_WITH_RSA, PublicKeyCode::Rsa, HashCode::Sha256),
    (ECDSA_WITH_SHA384, PublicKeyCode::Ecdsa, HashCode::Sha384),
    (SHA384_WITH_RSA, PublicKeyCode::Rsa, HashCode::Sha384),
    (ECDSA_WITH_SHA512, PublicKeyCode::Ecdsa, HashCode::Sha512),
    (SHA512_WITH_RSA, PublicKeyCode::Rsa, HashCode::Sha512),
];

impl TryFrom<&ObjectIdentifier> for AlgorithmCodes {
    type Error = SignerError;

    fn try_from(oid: &ObjectIdentifier) -> SignerResult<Self> {
        SIGNATURE_ALGORITHMS
            .iter()
            .find(|(known, _, _)| known == oid)
            .map(|&(_, public_key, hash)| Self { public_key, hash })
            .ok_or_else(|| SignerError::UnsupportedAlgorithm(format!("signature algorithm {oid}")))
    }
}

/// CMS digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl From<HashCode> for DigestAlgorithm {
    fn from(hash: HashCode) -> Self {
        match hash {
            HashCode::Sha1 => Self::Sha1,
            HashCode::Sha256 => Self::Sha256,
            HashCode::Sha384 => Self::Sha384,
            HashCode::Sha512 => Self::Sha512,
        }
    }
}

impl DigestAlgorithm {
    pub fn from_oid(oid: &ObjectIdentifier) -> SignerResult<Self> {
        [Self::Sha1, Self::Sha256, Self::Sha384, Self::Sha512]
            .into_iter()
            .find(|alg| alg.oid() == *oid)
            .ok_or_else(|| SignerError::UnsupportedAlgorithm(format!("digest algorithm {oid}")))
    }

    #[must_use]
    pub fn oid(self) -> ObjectIdentifier {
        match self {
            Self::Sha1 => ID_SHA1,
            Self::Sha256 => ID_SHA256,
            Self::Sha384 => ID_SHA384,
            Self::Sha512 => ID_SHA512,
        }
    }

    #[must_use]
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => openssl::sha::sha1(data).to_vec(),
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Sha384 => Sha384::digest(data).to_vec(),
            Self::Sha512 => Sha512::digest(data).to_vec(),
        }
    }

    #[must_use]
    pub fn message_digest(self) -> openssl::hash::MessageDigest {
        use openssl::hash::MessageDigest;
        match self {
            Self::Sha1 => MessageDigest::sha1(),
            Self::Sha256 => MessageDigest::sha256(),
            Self::Sha384 => MessageDigest::sha384(),
            Self::Sha512 => MessageDigest::sha512(),
        }
    }
}
