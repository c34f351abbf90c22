//! Certificate store adapter.
//!
//! A store hands out certificates (with their issuer chain and, when
//! available, the private key). Lookups open, enumerate and release the
//! backing store within a single call; nothing is cached between calls.

use crate::domain::certificate::{certificates_from_pem, CertificateExt};
use crate::domain::types::IdentityToken;
use crate::infra::error::{SignerError, SignerResult};
use der::Encode;
use openssl::pkey::{PKey, Private, Public};
use std::fs;
use std::path::PathBuf;
use x509_cert::Certificate;

/// File extensions the directory store reads.
const BUNDLE_EXTENSIONS: [&str; 3] = ["pem", "crt", "cer"];

/// A certificate as found in a store.
#[derive(Debug, Clone)]
pub struct StoredCertificate {
    pub certificate: Certificate,
    /// Issuers, nearest first.
    pub chain: Vec<Certificate>,
    private_key: Option<PKey<Private>>,
}

impl StoredCertificate {
    #[must_use]
    pub fn new(
        certificate: Certificate,
        chain: Vec<Certificate>,
        private_key: Option<PKey<Private>>,
    ) -> Self {
        Self {
            certificate,
            chain,
            private_key,
        }
    }

    /// Parses a PEM bundle: end-entity certificate first, then its issuers,
    /// optionally with a private key block anywhere in the file.
    pub fn from_pem(pem: &[u8]) -> SignerResult<Self> {
        let mut certs = certificates_from_pem(pem)?.into_iter();
        let certificate = certs.next().ok_or_else(|| {
            SignerError::DecodeFailure("bundle contains no certificate".into())
        })?;
        let private_key = if contains_private_key(pem) {
            Some(PKey::private_key_from_pem(pem)?)
        } else {
            None
        };
        Ok(Self::new(certificate, certs.collect(), private_key))
    }

    #[must_use]
    pub fn has_private_key(&self) -> bool {
        self.private_key.is_some()
    }

    /// Whether this certificate is the one `identity` names.
    pub fn matches(&self, identity: &IdentityToken) -> SignerResult<bool> {
        Ok(match identity {
            IdentityToken::Email(email) => self.certificate.matches_email(email),
            IdentityToken::Fingerprint(fpr) => self.certificate.fingerprint()?.eq_ignore_ascii_case(fpr),
        })
    }
}

fn contains_private_key(pem: &[u8]) -> bool {
    pem.windows(b"PRIVATE KEY-----".len())
        .any(|w| w == b"PRIVATE KEY-----")
}

/// A certificate whose private key can sign.
#[derive(Debug, Clone)]
pub struct Signer {
    certificate: Certificate,
    chain: Vec<Certificate>,
    private_key: PKey<Private>,
}

impl Signer {
    #[must_use]
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Signer certificate followed by its issuers.
    #[must_use]
    pub fn chain(&self) -> Vec<&Certificate> {
        std::iter::once(&self.certificate)
            .chain(self.chain.iter())
            .collect()
    }

    #[must_use]
    pub fn private_key(&self) -> &PKey<Private> {
        &self.private_key
    }

    pub fn fingerprint(&self) -> SignerResult<String> {
        self.certificate.fingerprint()
    }
}

impl TryFrom<StoredCertificate> for Signer {
    type Error = SignerError;

    fn try_from(stored: StoredCertificate) -> SignerResult<Self> {
        let name = stored.certificate.subject_string();
        let Some(private_key) = stored.private_key else {
            return Err(SignerError::SignerLacksPrivateKey(name));
        };
        let public = public_key_of(&stored.certificate)?;
        if !private_key.public_eq(&public) {
            log::debug!("private key does not belong to {name}");
            return Err(SignerError::SignerLacksPrivateKey(name));
        }
        Ok(Self {
            certificate: stored.certificate,
            chain: stored.chain,
            private_key,
        })
    }
}

/// The certificate's subject public key as an OpenSSL key.
pub fn public_key_of(certificate: &Certificate) -> SignerResult<PKey<Public>> {
    let spki = certificate.tbs_certificate.subject_public_key_info.to_der()?;
    Ok(PKey::public_key_from_der(&spki)?)
}

/// Source of certificates.
pub trait CertificateStore {
    /// Every certificate in the store.
    fn certificates(&self) -> SignerResult<Vec<StoredCertificate>>;

    /// First certificate `identity` names.
    fn find(&self, identity: &IdentityToken) -> SignerResult<Option<StoredCertificate>> {
        for stored in self.certificates()? {
            if stored.matches(identity)? {
                return Ok(Some(stored));
            }
        }
        Ok(None)
    }

    /// Resolves `identity` to a certificate that can sign.
    ///
    /// Prefers a match that carries a private key when several certificates
    /// match the same identity.
    fn find_signer(&self, identity: &IdentityToken) -> SignerResult<Signer> {
        let mut fallback = None;
        for stored in self.certificates()? {
            if !stored.matches(identity)? {
                continue;
            }
            if stored.has_private_key() {
                return Signer::try_from(stored);
            }
            fallback.get_or_insert(stored);
        }
        match fallback {
            Some(stored) => Signer::try_from(stored),
            None => Err(SignerError::SignerNotFound(identity.to_string())),
        }
    }
}

/// Directory of PEM bundles, one end-entity certificate per file.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn bundle_paths(&self) -> SignerResult<Vec<PathBuf>> {
        if !self.root.is_dir() {
            log::debug!("certificate store {} does not exist", self.root.display());
            return Ok(Vec::new());
        }
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.root)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        BUNDLE_EXTENSIONS
                            .iter()
                            .any(|known| ext.eq_ignore_ascii_case(known))
                    })
            })
            .collect();
        paths.sort();
        Ok(paths)
    }
}

impl CertificateStore for DirectoryStore {
    fn certificates(&self) -> SignerResult<Vec<StoredCertificate>> {
        let mut out = Vec::new();
        for path in self.bundle_paths()? {
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!("skipping {}: {e}", path.display());
                    continue;
                }
            };
            match StoredCertificate::from_pem(&bytes) {
                Ok(stored) => out.push(stored),
                Err(e) => log::warn!("skipping {}: {e}", path.display()),
            }
        }
        log::debug!(
            "certificate store {} holds {} certificates",
            self.root.display(),
            out.len()
        );
        Ok(out)
    }
}

/// Fixed in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Vec<StoredCertificate>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(entries: Vec<StoredCertificate>) -> Self {
        Self { entries }
    }
}

impl CertificateStore for MemoryStore {
    fn certificates(&self) -> SignerResult<Vec<StoredCertificate>> {
        Ok(self.entries.clone())
    }
}
