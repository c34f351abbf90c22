//! `ListKeysWorkflow` prints the certificates a store holds.

use crate::adapters::cert_store::CertificateStore;
use crate::domain::certificate::CertificateExt;
use crate::infra::error::{SignerError, SignerResult};
use chrono::SecondsFormat;
use std::io::Write;
use x509_cert::Certificate;

pub struct ListKeysWorkflow<'a> {
    store: &'a dyn CertificateStore,
}

impl<'a> ListKeysWorkflow<'a> {
    pub fn new(store: &'a dyn CertificateStore) -> Self {
        Self { store }
    }

    /// Writes one block per certificate, blocks separated by a blank line.
    pub fn run(&self, out: &mut dyn Write) -> SignerResult<()> {
        let stored = self.store.certificates()?;
        for (i, entry) in stored.iter().enumerate() {
            if i != 0 {
                writeln!(out).map_err(output_error)?;
            }
            write_entry(out, &entry.certificate)?;
        }
        out.flush().map_err(output_error)
    }
}

fn write_entry(out: &mut dyn Write, cert: &Certificate) -> SignerResult<()> {
    let algorithm = &cert.signature_algorithm.oid;
    let algorithm_name = const_oid::db::DB
        .by_oid(algorithm)
        .map_or_else(|| algorithm.to_string(), str::to_string);
    let block = format!(
        "ID: {}\nS/N: {}\nSignature Algorithm: {}\nValidity: {} - {}\nIssuer: {}\nSubject: {}\nEmails: {}\n",
        cert.fingerprint()?,
        cert.serial_hex(),
        algorithm_name,
        cert.not_before().to_rfc3339_opts(SecondsFormat::Secs, true),
        cert.not_after().to_rfc3339_opts(SecondsFormat::Secs, true),
        cert.issuer_string(),
        cert.subject_string(),
        cert.email_addresses().join(", "),
    );
    out.write_all(block.as_bytes()).map_err(output_error)
}

fn output_error(e: std::io::Error) -> SignerError {
    SignerError::OutputError(e.to_string())
}
