//! Read-only accessors over X.509 certificates.
//!
//! Fingerprints are the SHA-1 of the certificate DER in upper-case hex, the
//! form Windows calls the thumbprint and the status protocol carries as key ID.

use crate::domain::constants::{ID_CE_SUBJECT_ALT_NAME, ID_EMAIL_ADDRESS};
use crate::infra::error::SignerResult;
use chrono::{DateTime, Utc};
use der::{Decode, Encode};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::SubjectAltName;
use x509_cert::Certificate;

pub trait CertificateExt {
    /// SHA-1 thumbprint, upper-case hex.
    fn fingerprint(&self) -> SignerResult<String>;
    fn subject_string(&self) -> String;
    fn issuer_string(&self) -> String;
    fn serial_hex(&self) -> String;
    /// Subject `emailAddress` attributes followed by `rfc822Name` alternative names.
    fn email_addresses(&self) -> Vec<String>;
    fn not_before(&self) -> DateTime<Utc>;
    fn not_after(&self) -> DateTime<Utc>;
    fn is_self_signed(&self) -> bool;
    fn matches_email(&self, email: &str) -> bool {
        self.email_addresses()
            .iter()
            .any(|e| e.eq_ignore_ascii_case(email))
    }
}

impl CertificateExt for Certificate {
    fn fingerprint(&self) -> SignerResult<String> {
        let der = self.to_der()?;
        Ok(hex::encode_upper(openssl::sha::sha1(&der)))
    }

    fn subject_string(&self) -> String {
        self.tbs_certificate.subject.to_string()
    }

    fn issuer_string(&self) -> String {
        self.tbs_certificate.issuer.to_string()
    }

    fn serial_hex(&self) -> String {
        hex::encode_upper(self.tbs_certificate.serial_number.as_bytes())
    }

    fn email_addresses(&self) -> Vec<String> {
        let mut emails: Vec<String> = self
            .tbs_certificate
            .subject
            .0
            .iter()
            .flat_map(|rdn| rdn.0.iter())
            .filter(|atv| atv.oid == ID_EMAIL_ADDRESS)
            .filter_map(|atv| std::str::from_utf8(atv.value.value()).ok())
            .map(str::to_string)
            .collect();

        let san = self
            .tbs_certificate
            .extensions
            .iter()
            .flatten()
            .filter(|ext| ext.extn_id == ID_CE_SUBJECT_ALT_NAME)
            .filter_map(|ext| SubjectAltName::from_der(ext.extn_value.as_bytes()).ok());
        for names in san {
            for name in names.0 {
                if let GeneralName::Rfc822Name(addr) = name {
                    emails.push(addr.to_string());
                }
            }
        }
        emails
    }

    fn not_before(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from(self.tbs_certificate.validity.not_before.to_system_time())
    }

    fn not_after(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from(self.tbs_certificate.validity.not_after.to_system_time())
    }

    fn is_self_signed(&self) -> bool {
        self.tbs_certificate.issuer == self.tbs_certificate.subject
    }
}

/// Parses every `CERTIFICATE` block in a PEM bundle, in file order.
pub fn certificates_from_pem(pem: &[u8]) -> SignerResult<Vec<Certificate>> {
    let stack = openssl::x509::X509::stack_from_pem(pem)?;
    stack
        .iter()
        .map(|x509| -> SignerResult<Certificate> { Ok(Certificate::from_der(&x509.to_der()?)?) })
        .collect()
}
