//! RFC 3161 Time-Stamp Protocol structures and the timestamp token wrapper.

use crate::domain::algorithm::DigestAlgorithm;
use crate::domain::constants::ID_CT_TST_INFO;
use crate::domain::envelope::SignedEnvelope;
use crate::infra::error::{SignerError, SignerResult};
use chrono::{DateTime, Utc};
use const_oid::ObjectIdentifier;
use der::asn1::{BitString, GeneralizedTime, Int, OctetString, Uint};
use der::{Any, Decode, Encode, Sequence};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::Extensions;
use x509_cert::Certificate;

/// Algorithm identifier with optional parameters
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct AlgorithmIdentifier {
    pub algorithm: ObjectIdentifier,
    #[asn1(optional = "true")]
    pub parameters: Option<Any>,
}

impl From<DigestAlgorithm> for AlgorithmIdentifier {
    fn from(alg: DigestAlgorithm) -> Self {
        Self {
            algorithm: alg.oid(),
            parameters: None,
        }
    }
}

/// `MessageImprint` (RFC 3161 section 2.4.1)
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct MessageImprint {
    pub hash_algorithm: AlgorithmIdentifier,
    pub hashed_message: OctetString,
}

impl MessageImprint {
    /// Hashes `data` with `alg`.
    pub fn of(alg: DigestAlgorithm, data: &[u8]) -> SignerResult<Self> {
        Ok(Self {
            hash_algorithm: alg.into(),
            hashed_message: OctetString::new(alg.digest(data))?,
        })
    }

    /// Whether this imprint is the hash of `data`.
    pub fn matches(&self, data: &[u8]) -> SignerResult<bool> {
        let alg = DigestAlgorithm::from_oid(&self.hash_algorithm.algorithm)?;
        Ok(alg.digest(data) == self.hashed_message.as_bytes())
    }
}

/// `TimeStampReq` (RFC 3161 section 2.4.1); extensions are never sent.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TimeStampReq {
    pub version: u8,
    pub message_imprint: MessageImprint,
    #[asn1(optional = "true")]
    pub req_policy: Option<ObjectIdentifier>,
    #[asn1(optional = "true")]
    pub nonce: Option<Uint>,
    #[asn1(default = "default_false")]
    pub cert_req: bool,
}

fn default_false() -> bool {
    false
}

/// `PKIStatusInfo` (RFC 3161 section 2.4.2)
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct PkiStatusInfo {
    pub status: u8,
    #[asn1(optional = "true")]
    pub status_string: Option<Vec<String>>,
    #[asn1(optional = "true")]
    pub fail_info: Option<BitString>,
}

impl PkiStatusInfo {
    /// `granted` or `grantedWithMods`
    #[must_use]
    pub fn is_granted(&self) -> bool {
        self.status <= 1
    }
}

/// `Accuracy` (RFC 3161 section 2.4.2)
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct Accuracy {
    #[asn1(optional = "true")]
    pub seconds: Option<u64>,
    #[asn1(context_specific = "0", optional = "true")]
    pub millis: Option<u16>,
    #[asn1(context_specific = "1", optional = "true")]
    pub micros: Option<u16>,
}

/// `TSTInfo` (RFC 3161 section 2.4.2)
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TstInfo {
    pub version: u8,
    pub policy: ObjectIdentifier,
    pub message_imprint: MessageImprint,
    pub serial_number: Int,
    pub gen_time: GeneralizedTime,
    #[asn1(optional = "true")]
    pub accuracy: Option<Accuracy>,
    #[asn1(default = "default_false")]
    pub ordering: bool,
    #[asn1(optional = "true")]
    pub nonce: Option<Uint>,
    #[asn1(context_specific = "0", optional = "true", tag_mode = "EXPLICIT")]
    pub tsa: Option<GeneralName>,
    #[asn1(context_specific = "1", optional = "true", tag_mode = "IMPLICIT")]
    pub extensions: Option<Extensions>,
}

/// `TimeStampResp` (RFC 3161 section 2.4.2)
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TimeStampResp {
    pub status: PkiStatusInfo,
    #[asn1(optional = "true")]
    pub time_stamp_token: Option<Any>,
}

/// A timestamp token: CMS `SignedData` whose content is a `TSTInfo`.
#[derive(Debug, Clone)]
pub struct TimestampToken {
    envelope: SignedEnvelope,
    info: TstInfo,
    der: Vec<u8>,
}

impl TimestampToken {
    /// Decodes a token from the start of `bytes`, returning the number of
    /// bytes the token occupied.
    pub fn decode_prefix(bytes: &[u8]) -> SignerResult<(Self, usize)> {
        let (envelope, consumed) = SignedEnvelope::decode_prefix(bytes)
            .map_err(|e| SignerError::TimestampInvalid(e.to_string()))?;
        if envelope.content_type() != ID_CT_TST_INFO {
            return Err(SignerError::TimestampInvalid(format!(
                "token content type {} is not TSTInfo",
                envelope.content_type()
            )));
        }
        let econtent = envelope
            .content()
            .ok_or_else(|| SignerError::TimestampInvalid("token carries no TSTInfo".into()))?;
        let info = TstInfo::from_der(econtent)
            .map_err(|e| SignerError::TimestampInvalid(format!("malformed TSTInfo: {e}")))?;
        let der = bytes[..consumed].to_vec();
        Ok((
            Self {
                envelope,
                info,
                der,
            },
            consumed,
        ))
    }

    /// Decodes a token that must span all of `bytes`.
    pub fn decode(bytes: &[u8]) -> SignerResult<Self> {
        let (token, consumed) = Self::decode_prefix(bytes)?;
        if consumed != bytes.len() {
            return Err(SignerError::TimestampInvalid(format!(
                "{} trailing bytes after timestamp token",
                bytes.len() - consumed
            )));
        }
        Ok(token)
    }

    #[must_use]
    pub fn info(&self) -> &TstInfo {
        &self.info
    }

    #[must_use]
    pub fn envelope(&self) -> &SignedEnvelope {
        &self.envelope
    }

    /// `genTime` as UTC.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from(self.info.gen_time.to_system_time())
    }

    /// The authority certificate embedded in the token, if any.
    #[must_use]
    pub fn signer_certificate(&self) -> Option<&Certificate> {
        self.envelope
            .signer_infos()
            .first()
            .and_then(|si| self.envelope.signer_certificate(si))
    }

    /// Whether the token's message imprint is the hash of `signature_value`.
    pub fn is_bound_to(&self, signature_value: &[u8]) -> SignerResult<bool> {
        self.info.message_imprint.matches(signature_value)
    }

    /// The token as an attribute value.
    pub fn to_any(&self) -> SignerResult<Any> {
        Ok(Any::from_der(&self.der)?)
    }
}

/// Encodes a request to DER.
pub fn encode_request(request: &TimeStampReq) -> SignerResult<Vec<u8>> {
    Ok(request.to_der()?)
}
