//! `VerifyWorkflow` checks attached and detached signatures.
//!
//! The status stream always opens with `NEWSIG` and closes with exactly one
//! of `TRUST_FULLY` (good), the `BADSIG` lines (bad, certificates known) or
//! `ERRSIG` (nothing recoverable). The error that caused a failure is
//! returned after the status lines are written, so exit code and protocol
//! agree.

use crate::adapters::cms_engine::CmsEngine;
use crate::adapters::output::OutputChannels;
use crate::domain::certificate::CertificateExt;
use crate::domain::envelope::{signing_time, SignedEnvelope};
use crate::domain::pem;
use crate::domain::status::StatusEvent;
use crate::infra::error::{SignerError, SignerResult};
use crate::infra::input::InputSource;
use crate::services::timestamp_validator::TimestampValidator;
use chrono::SecondsFormat;
use x509_cert::Certificate;

pub struct VerifyWorkflow<'a> {
    engine: &'a dyn CmsEngine,
}

impl<'a> VerifyWorkflow<'a> {
    pub fn new(engine: &'a dyn CmsEngine) -> Self {
        Self { engine }
    }

    /// Verifies the signature named by `files`.
    ///
    /// Zero or one source: attached signature (standard input when empty).
    /// Two sources: detached signature followed by the signed content.
    pub fn run(&self, channels: &mut OutputChannels, files: &[InputSource]) -> SignerResult<()> {
        channels.emit_status(&StatusEvent::NewSig)?;

        let envelope = match self.load(files) {
            Ok(envelope) => envelope,
            Err(e) => {
                log::debug!("signature could not be decoded: {e}");
                channels.emit_status(&StatusEvent::ErrSig)?;
                return Err(e);
            }
        };

        match self.check(&envelope) {
            Ok(()) => {
                self.report(channels, &envelope, true)?;
                channels.emit_status(&StatusEvent::TrustFully)?;
                channels.flush()?;
                Ok(())
            }
            Err(e) => {
                log::debug!("verification failed: {e}");
                if envelope.certificates().is_empty() {
                    channels.emit_status(&StatusEvent::ErrSig)?;
                } else {
                    self.report(channels, &envelope, false)?;
                }
                channels.flush()?;
                Err(e)
            }
        }
    }

    fn load(&self, files: &[InputSource]) -> SignerResult<SignedEnvelope> {
        let (signature, content) = match files {
            [] => (InputSource::Stdin.read_all()?, None),
            [attached] => (attached.read_all()?, None),
            [signature, content] => (signature.read_all()?, Some(content.read_all()?)),
            _ => {
                return Err(SignerError::InvalidArgument(format!(
                    "verify takes at most 2 files, got {}",
                    files.len()
                )))
            }
        };
        let (armored, der) = pem::try_decode(&signature)?.into_parts();
        log::debug!(
            "decoding {} signature ({} bytes)",
            if armored { "armored" } else { "binary" },
            der.len()
        );
        self.engine.decode(&der, content)
    }

    /// Signature check, then every signer's timestamps against that signer's
    /// own certificate validity window.
    fn check(&self, envelope: &SignedEnvelope) -> SignerResult<()> {
        self.engine.verify(envelope)?;
        let validator = TimestampValidator::new(self.engine);
        for signer_info in envelope.signer_infos() {
            let certificate = envelope.signer_certificate(signer_info);
            let verdict = validator.check_timestamp(
                signer_info,
                certificate.map(|c| c.not_before()),
                certificate.map(|c| c.not_after()),
            );
            if verdict == Some(false) {
                return Err(SignerError::TimestampInvalid(
                    "timestamp token failed validation".into(),
                ));
            }
        }
        Ok(())
    }

    /// Verdict lines per embedded certificate, then the info sequence for the
    /// first signer.
    fn report(
        &self,
        channels: &mut OutputChannels,
        envelope: &SignedEnvelope,
        good: bool,
    ) -> SignerResult<()> {
        let certificates = envelope.certificates();
        for certificate in &certificates {
            let fingerprint = certificate.fingerprint()?;
            let subject = certificate.subject_string();
            channels.emit_status(&if good {
                StatusEvent::GoodSig {
                    fingerprint,
                    subject,
                }
            } else {
                StatusEvent::BadSig {
                    fingerprint,
                    subject,
                }
            })?;
        }

        let first_signer = envelope.signer_infos().first();
        let Some(issued) = first_signer
            .and_then(|si| envelope.signer_certificate(si))
            .or_else(|| certificates.first().copied())
        else {
            return Ok(());
        };
        self.describe(channels, issued, envelope, good)
    }

    fn describe(
        &self,
        channels: &mut OutputChannels,
        issued: &Certificate,
        envelope: &SignedEnvelope,
        good: bool,
    ) -> SignerResult<()> {
        channels.emit_info(&format!(
            "Signature made using certificate ID 0x{}",
            issued.fingerprint()?
        ))?;
        if let Some(first) = envelope.signer_infos().first() {
            if let Some(made) = signing_time(first) {
                channels.emit_info(&format!(
                    "Signature made at {}",
                    made.to_rfc3339_opts(SecondsFormat::Secs, true)
                ))?;
            }
            if let Some(stamped) = TimestampValidator::new(self.engine).timestamp_time(first) {
                channels.emit_info(&format!(
                    "Signature timestamped by signing authority {}",
                    stamped.to_rfc3339_opts(SecondsFormat::Secs, true)
                ))?;
            }
        }
        channels.emit_info(&format!("Signature issued by '{}'", issued.issuer_string()))?;
        let verdict = if good { "Good" } else { "Bad" };
        channels.emit_info(&format!(
            "{verdict} signature from '{}'",
            issued.subject_string()
        ))
    }
}
