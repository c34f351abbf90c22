//! CMS signing and verification engine.
//!
//! The engine turns a signer and content into a `SignedData` structure and
//! checks the signatures of decoded structures. Verification is
//! signature-only: certificate chains are not built or trusted here.

use crate::adapters::cert_store::{public_key_of, Signer};
use crate::domain::algorithm::{AlgorithmCodes, DigestAlgorithm};
use crate::domain::certificate::CertificateExt;
use crate::domain::constants::{
    ECDSA_WITH_SHA256, EC_PUBLIC_KEY, ID_CONTENT_TYPE, ID_DATA, ID_MESSAGE_DIGEST,
    ID_SIGNING_TIME, RSA_ENCRYPTION,
};
use crate::domain::envelope::{attribute, signed_attribute_values, SignedEnvelope};
use crate::domain::include_policy::CertificateIncludePolicy;
use crate::infra::error::{SignerError, SignerResult};
use chrono::{DateTime, Utc};
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::content_info::CmsVersion;
use cms::signed_data::{
    CertificateSet, EncapsulatedContentInfo, SignedData, SignerIdentifier, SignerInfo,
    SignerInfos,
};
use const_oid::ObjectIdentifier;
use der::asn1::{Null, OctetString, SetOfVec, UtcTime};
use der::{Any, Encode};
use openssl::pkey::Id;
use spki::AlgorithmIdentifierOwned;
use x509_cert::time::Time;

/// Parameters of one signing operation.
#[derive(Debug, Clone)]
pub struct CmsSignOptions {
    /// Leave the content out of the structure.
    pub detached: bool,
    pub include: CertificateIncludePolicy,
    /// Adds a `signingTime` signed attribute.
    pub signing_time: Option<DateTime<Utc>>,
    /// `eContentType`; `id-data` for ordinary messages.
    pub content_type: ObjectIdentifier,
}

impl CmsSignOptions {
    #[must_use]
    pub fn new(detached: bool, include: CertificateIncludePolicy) -> Self {
        Self {
            detached,
            include,
            signing_time: None,
            content_type: ID_DATA,
        }
    }

    #[must_use]
    pub fn with_signing_time(mut self, time: Option<DateTime<Utc>>) -> Self {
        self.signing_time = time;
        self
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: ObjectIdentifier) -> Self {
        self.content_type = content_type;
        self
    }
}

/// Byte-level CMS capability used by the workflows.
pub trait CmsEngine {
    /// Signs `content`, producing a single-signer structure.
    fn sign(
        &self,
        signer: &Signer,
        content: &[u8],
        options: &CmsSignOptions,
    ) -> SignerResult<SignedEnvelope>;

    /// Decodes a DER structure; detached signatures need their content.
    fn decode(&self, der: &[u8], detached_content: Option<Vec<u8>>) -> SignerResult<SignedEnvelope> {
        SignedEnvelope::decode(der, detached_content)
    }

    /// Checks every signer's signature over the envelope content.
    fn verify(&self, envelope: &SignedEnvelope) -> SignerResult<()>;
}

/// OpenSSL-backed engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpensslCmsEngine;

impl OpensslCmsEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl CmsEngine for OpensslCmsEngine {
    fn sign(
        &self,
        signer: &Signer,
        content: &[u8],
        options: &CmsSignOptions,
    ) -> SignerResult<SignedEnvelope> {
        let digest_alg = DigestAlgorithm::Sha256;
        let certificate = signer.certificate();

        let mut attrs = vec![
            attribute(ID_CONTENT_TYPE, Any::encode_from(&options.content_type)?)?,
            attribute(
                ID_MESSAGE_DIGEST,
                Any::encode_from(&OctetString::new(digest_alg.digest(content))?)?,
            )?,
        ];
        if let Some(time) = options.signing_time {
            attrs.push(attribute(ID_SIGNING_TIME, Any::encode_from(&cms_time(time)?)?)?);
        }
        let signed_attrs = SetOfVec::try_from(attrs)?;
        let to_be_signed = signed_attrs.to_der()?;

        let key = signer.private_key();
        let signature_algorithm = match key.id() {
            Id::RSA => AlgorithmIdentifierOwned {
                oid: RSA_ENCRYPTION,
                parameters: Some(Any::encode_from(&Null)?),
            },
            Id::EC => AlgorithmIdentifierOwned {
                oid: ECDSA_WITH_SHA256,
                parameters: None,
            },
            other => {
                return Err(SignerError::UnsupportedAlgorithm(format!(
                    "signing key type {other:?}"
                )))
            }
        };
        let mut os_signer = openssl::sign::Signer::new(digest_alg.message_digest(), key)?;
        os_signer.update(&to_be_signed)?;
        let signature = os_signer.sign_to_vec()?;

        let signer_info = SignerInfo {
            version: CmsVersion::V1,
            sid: SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
                issuer: certificate.tbs_certificate.issuer.clone(),
                serial_number: certificate.tbs_certificate.serial_number.clone(),
            }),
            digest_alg: AlgorithmIdentifierOwned {
                oid: digest_alg.oid(),
                parameters: None,
            },
            signed_attrs: Some(signed_attrs),
            signature_algorithm,
            signature: OctetString::new(signature)?,
            unsigned_attrs: None,
        };

        let chain = signer.chain();
        let mut carried: Vec<CertificateChoices> = Vec::new();
        let mut seen: Vec<Vec<u8>> = Vec::new();
        for cert in options.include.select(&chain, |c| c.is_self_signed()) {
            let der = cert.to_der()?;
            if !seen.contains(&der) {
                seen.push(der);
                carried.push(CertificateChoices::Certificate((*cert).clone()));
            }
        }
        let certificates = if carried.is_empty() {
            None
        } else {
            Some(CertificateSet(SetOfVec::try_from(carried)?))
        };

        let econtent = if options.detached {
            None
        } else {
            Some(Any::encode_from(&OctetString::new(content.to_vec())?)?)
        };

        let signed_data = SignedData {
            // RFC 5652 5.1: v3 whenever the content is not id-data
            version: if options.content_type == ID_DATA {
                CmsVersion::V1
            } else {
                CmsVersion::V3
            },
            digest_algorithms: SetOfVec::try_from(vec![AlgorithmIdentifierOwned {
                oid: digest_alg.oid(),
                parameters: None,
            }])?,
            encap_content_info: EncapsulatedContentInfo {
                econtent_type: options.content_type,
                econtent,
            },
            certificates,
            crls: None,
            signer_infos: SignerInfos(SetOfVec::try_from(vec![signer_info])?),
        };

        log::debug!(
            "created {} signature for {}",
            if options.detached { "detached" } else { "attached" },
            certificate.subject_string()
        );
        Ok(SignedEnvelope::new(
            signed_data,
            options.detached.then(|| content.to_vec()),
        ))
    }

    fn verify(&self, envelope: &SignedEnvelope) -> SignerResult<()> {
        let infos = envelope.signer_infos();
        if infos.is_empty() {
            return Err(SignerError::SignatureInvalid("no signer information".into()));
        }
        let content = envelope.content().ok_or_else(|| {
            SignerError::SignatureInvalid("detached signature requires the signed content".into())
        })?;
        for signer_info in infos {
            verify_signer_info(envelope, signer_info, content)?;
        }
        Ok(())
    }
}

fn verify_signer_info(
    envelope: &SignedEnvelope,
    signer_info: &SignerInfo,
    content: &[u8],
) -> SignerResult<()> {
    let certificate = envelope.signer_certificate(signer_info).ok_or_else(|| {
        SignerError::SignatureInvalid("signer certificate is not embedded".into())
    })?;
    let digest_alg = DigestAlgorithm::from_oid(&signer_info.digest_alg.oid)?;

    let signed_bytes = match &signer_info.signed_attrs {
        Some(attrs) => {
            let expected = signed_attribute_values(signer_info, &ID_MESSAGE_DIGEST)
                .next()
                .ok_or_else(|| SignerError::SignatureInvalid("missing message digest".into()))?
                .decode_as::<OctetString>()
                .map_err(|e| SignerError::SignatureInvalid(format!("bad message digest: {e}")))?;
            if expected.as_bytes() != digest_alg.digest(content).as_slice() {
                return Err(SignerError::SignatureInvalid(
                    "message digest does not match content".into(),
                ));
            }
            let declared = signed_attribute_values(signer_info, &ID_CONTENT_TYPE)
                .next()
                .and_then(|v| v.decode_as::<ObjectIdentifier>().ok());
            if declared.is_some_and(|oid| oid != envelope.content_type()) {
                return Err(SignerError::SignatureInvalid(
                    "content type attribute does not match content".into(),
                ));
            }
            attrs.to_der()?
        }
        None => content.to_vec(),
    };

    let hash = signature_digest(&signer_info.signature_algorithm.oid, digest_alg)?;
    let public = public_key_of(certificate)?;
    let mut verifier = openssl::sign::Verifier::new(hash.message_digest(), &public)?;
    verifier.update(&signed_bytes)?;
    let valid = verifier
        .verify(signer_info.signature.as_bytes())
        .map_err(|e| SignerError::SignatureInvalid(e.to_string()))?;
    if !valid {
        return Err(SignerError::SignatureInvalid(format!(
            "signature by '{}' does not verify",
            certificate.subject_string()
        )));
    }
    Ok(())
}

/// Digest the signature algorithm implies.
fn signature_digest(
    algorithm: &ObjectIdentifier,
    digest_alg: DigestAlgorithm,
) -> SignerResult<DigestAlgorithm> {
    if *algorithm == RSA_ENCRYPTION || *algorithm == EC_PUBLIC_KEY {
        return Ok(digest_alg);
    }
    AlgorithmCodes::try_from(algorithm).map(|codes| codes.hash.into())
}

/// `signingTime` value: UTCTime through 2049.
fn cms_time(time: DateTime<Utc>) -> SignerResult<Time> {
    let system_time = std::time::SystemTime::from(time);
    let date_time = der::DateTime::from_system_time(system_time)?;
    Ok(Time::UtcTime(UtcTime::from_date_time(date_time)?))
}
