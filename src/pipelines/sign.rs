//! `SignWorkflow` sequences a signing request.
//!
//! Signer lookup, CMS signature, optional RFC 3161 timestamp, then the
//! `BEGIN_SIGNING` / `SIG_CREATED` status pair and the encoded output.
//! Nothing is returned to the caller unless every step succeeded.

use crate::adapters::cert_store::CertificateStore;
use crate::adapters::cms_engine::{CmsEngine, CmsSignOptions};
use crate::adapters::output::OutputChannels;
use crate::adapters::timestamp_http_client::TimestampTransport;
use crate::domain::algorithm::AlgorithmCodes;
use crate::domain::constants::SIGNED_MESSAGE_LABEL;
use crate::domain::include_policy::CertificateIncludePolicy;
use crate::domain::pem;
use crate::domain::status::{SignatureForm, StatusEvent};
use crate::domain::types::{IdentityToken, TimestampUrl};
use crate::infra::error::SignerResult;
use crate::services::timestamp::TimestampClient;
use chrono::{SubsecRound, Utc};

/// One signing operation.
#[derive(Debug, Clone)]
pub struct SignRequest {
    pub identity: IdentityToken,
    pub content: Vec<u8>,
    /// `None` disables timestamping.
    pub timestamp_authority: Option<TimestampUrl>,
    pub detached: bool,
    pub armor: bool,
    pub include: CertificateIncludePolicy,
}

pub struct SignWorkflow<'a, T> {
    store: &'a dyn CertificateStore,
    engine: &'a dyn CmsEngine,
    timestamps: TimestampClient<'a, T>,
}

impl<'a, T: TimestampTransport> SignWorkflow<'a, T> {
    pub fn new(store: &'a dyn CertificateStore, engine: &'a dyn CmsEngine, transport: T) -> Self {
        Self {
            store,
            engine,
            timestamps: TimestampClient::new(transport, engine),
        }
    }

    /// Signs `request.content`, returning DER or armored text.
    pub async fn run(
        &self,
        channels: &mut OutputChannels,
        request: SignRequest,
    ) -> SignerResult<Vec<u8>> {
        let signer = self.store.find_signer(&request.identity)?;
        let algorithms = AlgorithmCodes::try_from(&signer.certificate().signature_algorithm.oid)?;
        let fingerprint = signer.fingerprint()?;
        log::debug!("signing as {fingerprint} for {}", request.identity);

        channels.emit_status(&StatusEvent::BeginSigning)?;

        let created = Utc::now().trunc_subsecs(0);
        let options = CmsSignOptions::new(request.detached, request.include).with_signing_time(
            request
                .timestamp_authority
                .is_none()
                .then_some(created),
        );
        let mut envelope = self.engine.sign(&signer, &request.content, &options)?;

        if let Some(url) = &request.timestamp_authority {
            self.timestamps.request_timestamp(&mut envelope, url).await?;
        }

        let der = envelope.to_der()?;
        let output = if request.armor {
            let mut text = pem::encode(SIGNED_MESSAGE_LABEL, &der);
            text.push('\n');
            text.into_bytes()
        } else {
            der
        };

        channels.emit_status(&StatusEvent::SigCreated {
            form: SignatureForm::from_detached(request.detached),
            algorithms,
            created,
            fingerprint,
        })?;
        channels.emit_info("Finished signing")?;
        channels.flush()?;
        Ok(output)
    }
}
