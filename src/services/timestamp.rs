//! Timestamp client service.
//!
//! Requests an RFC 3161 counter-signature over the signature value of a
//! freshly signed envelope and embeds the returned token as the
//! `id-aa-timeStampToken` unsigned attribute of its only signer.

use crate::adapters::cms_engine::CmsEngine;
use crate::adapters::timestamp_http_client::{TimestampTransport, TransportResponse};
use crate::domain::algorithm::DigestAlgorithm;
use crate::domain::constants::{
    ID_AA_TIME_STAMP_TOKEN, TIMESTAMP_NONCE_LENGTH, TIMESTAMP_REPLY_MEDIA_TYPE,
};
use crate::domain::envelope::{attribute, SignedEnvelope};
use crate::domain::timestamp::{
    encode_request, MessageImprint, TimeStampReq, TimeStampResp, TimestampToken,
};
use crate::domain::types::TimestampUrl;
use crate::infra::error::{SignerError, SignerResult};
use der::asn1::Uint;
use der::{Decode, Encode};
use rand::rngs::OsRng;
use rand::RngCore;

/// Imprint algorithm for timestamp requests.
const IMPRINT_ALGORITHM: DigestAlgorithm = DigestAlgorithm::Sha384;

/// Builds a request over `signature_value` with a fresh random nonce.
pub fn build_request(signature_value: &[u8]) -> SignerResult<TimeStampReq> {
    if signature_value.is_empty() {
        return Err(SignerError::TimestampInvalid(
            "cannot timestamp an empty signature".into(),
        ));
    }
    let mut nonce = [0u8; TIMESTAMP_NONCE_LENGTH];
    OsRng.fill_bytes(&mut nonce);
    Ok(TimeStampReq {
        version: 1,
        message_imprint: MessageImprint::of(IMPRINT_ALGORITHM, signature_value)?,
        req_policy: None,
        nonce: Some(Uint::new(&nonce)?),
        cert_req: true,
    })
}

/// Talks to one timestamp authority per call through a transport.
pub struct TimestampClient<'e, T> {
    transport: T,
    engine: &'e dyn CmsEngine,
}

impl<'e, T: TimestampTransport> TimestampClient<'e, T> {
    /// `engine` checks the authority's signature on returned tokens.
    pub fn new(transport: T, engine: &'e dyn CmsEngine) -> Self {
        Self { transport, engine }
    }

    /// Timestamps the only signer of `envelope` and embeds the token.
    ///
    /// The envelope is left untouched on any failure.
    pub async fn request_timestamp(
        &self,
        envelope: &mut SignedEnvelope,
        url: &TimestampUrl,
    ) -> SignerResult<TimestampToken> {
        let signature_value = match envelope.signer_infos() {
            [only] => only.signature.as_bytes().to_vec(),
            infos => return Err(SignerError::MultipleSignersUnsupported(infos.len())),
        };

        let request = build_request(&signature_value)?;
        let response = self.transport.post(url, encode_request(&request)?).await?;
        check_transport(&response)?;

        let token = self.process_response(&request, &response.body)?;
        envelope.add_unsigned_attribute(attribute(ID_AA_TIME_STAMP_TOKEN, token.to_any()?)?)?;
        log::info!("signature timestamped at {} by {url}", token.timestamp());
        Ok(token)
    }

    /// Validates a DER `TimeStampResp` against the request that produced it.
    pub fn process_response(
        &self,
        request: &TimeStampReq,
        body: &[u8],
    ) -> SignerResult<TimestampToken> {
        let response = TimeStampResp::from_der(body)
            .map_err(|e| SignerError::TimestampInvalid(format!("malformed response: {e}")))?;
        if !response.status.is_granted() {
            let detail = response
                .status
                .status_string
                .as_ref()
                .map(|texts| texts.join("; "))
                .unwrap_or_default();
            return Err(SignerError::TimestampInvalid(format!(
                "request rejected with status {} {detail}",
                response.status.status
            )));
        }
        let token_any = response
            .time_stamp_token
            .ok_or_else(|| SignerError::TimestampInvalid("response carries no token".into()))?;
        let token = TimestampToken::decode(&token_any.to_der()?)?;
        let info = token.info();

        let requested = &request.message_imprint;
        if info.message_imprint.hash_algorithm.algorithm != requested.hash_algorithm.algorithm
            || info.message_imprint.hashed_message != requested.hashed_message
        {
            return Err(SignerError::TimestampInvalid(
                "message imprint differs from request".into(),
            ));
        }
        if request.nonce.is_some() && info.nonce != request.nonce {
            return Err(SignerError::TimestampInvalid("nonce differs from request".into()));
        }
        if request.cert_req && token.signer_certificate().is_none() {
            return Err(SignerError::TimestampInvalid(
                "authority certificate missing from token".into(),
            ));
        }
        self.engine
            .verify(token.envelope())
            .map_err(|e| SignerError::TimestampInvalid(format!("token signature: {e}")))?;
        Ok(token)
    }
}

/// HTTP-level acceptance: 2xx and the timestamp-reply media type.
fn check_transport(response: &TransportResponse) -> SignerResult<()> {
    if !response.is_success() {
        return Err(SignerError::TimestampAuthorityError {
            status: response.status,
            reason: "unexpected HTTP status".into(),
        });
    }
    let media_type = response
        .content_type
        .as_deref()
        .map(|value| value.split(';').next().unwrap_or_default().trim());
    if media_type != Some(TIMESTAMP_REPLY_MEDIA_TYPE) {
        return Err(SignerError::TimestampAuthorityError {
            status: response.status,
            reason: format!(
                "unexpected content type {}",
                response.content_type.as_deref().unwrap_or("(none)")
            ),
        });
    }
    Ok(())
}
