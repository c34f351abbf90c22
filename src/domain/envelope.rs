//! CMS `SignedData` envelope.
//!
//! Wraps the decoded ASN.1 structure together with the externally supplied
//! content of a detached signature, and offers the lookups the sign and
//! verify paths need (embedded certificates, signer certificate, signed and
//! unsigned attributes).

use crate::domain::constants::{ID_CE_SUBJECT_KEY_IDENTIFIER, ID_SIGNED_DATA, ID_SIGNING_TIME};
use crate::infra::error::{SignerError, SignerResult};
use chrono::{DateTime, Utc};
use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::signed_data::{SignedData, SignerIdentifier, SignerInfo, SignerInfos};
use const_oid::ObjectIdentifier;
use der::asn1::SetOfVec;
use der::{Any, Decode, Encode, Reader, SliceReader};
use x509_cert::attr::Attribute;
use x509_cert::time::Time;
use x509_cert::Certificate;

/// A signed CMS structure plus, for detached signatures, the signed content.
#[derive(Debug, Clone)]
pub struct SignedEnvelope {
    signed_data: SignedData,
    detached_content: Option<Vec<u8>>,
}

impl SignedEnvelope {
    #[must_use]
    pub fn new(signed_data: SignedData, detached_content: Option<Vec<u8>>) -> Self {
        Self {
            signed_data,
            detached_content,
        }
    }

    /// Decodes a DER `ContentInfo` holding `SignedData`.
    ///
    /// Pass the original content for detached signatures; it is ignored when
    /// the structure embeds its own content.
    pub fn decode(der: &[u8], detached_content: Option<Vec<u8>>) -> SignerResult<Self> {
        let (envelope, consumed) = Self::decode_prefix(der)?;
        if consumed != der.len() {
            return Err(SignerError::DecodeFailure(format!(
                "{} trailing bytes after signed data",
                der.len() - consumed
            )));
        }
        Ok(Self {
            detached_content,
            ..envelope
        })
    }

    /// Decodes the leading `ContentInfo` and reports how many bytes it used.
    pub fn decode_prefix(der: &[u8]) -> SignerResult<(Self, usize)> {
        let mut reader =
            SliceReader::new(der).map_err(|e| SignerError::DecodeFailure(e.to_string()))?;
        let content_info = ContentInfo::decode(&mut reader)
            .map_err(|e| SignerError::DecodeFailure(e.to_string()))?;
        let consumed = usize::try_from(reader.position())
            .map_err(|e| SignerError::DecodeFailure(e.to_string()))?;

        if content_info.content_type != ID_SIGNED_DATA {
            return Err(SignerError::DecodeFailure(format!(
                "content type {} is not signedData",
                content_info.content_type
            )));
        }
        let signed_data = content_info
            .content
            .decode_as::<SignedData>()
            .map_err(|e| SignerError::DecodeFailure(e.to_string()))?;
        Ok((Self::new(signed_data, None), consumed))
    }

    /// DER `ContentInfo` encoding.
    pub fn to_der(&self) -> SignerResult<Vec<u8>> {
        let content_info = ContentInfo {
            content_type: ID_SIGNED_DATA,
            content: Any::encode_from(&self.signed_data)?,
        };
        Ok(content_info.to_der()?)
    }

    #[must_use]
    pub fn content_type(&self) -> ObjectIdentifier {
        self.signed_data.encap_content_info.econtent_type
    }

    /// Whether the structure itself carries no content.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.signed_data.encap_content_info.econtent.is_none()
    }

    /// The signed content: embedded octets, or the detached content supplied
    /// at decode time.
    #[must_use]
    pub fn content(&self) -> Option<&[u8]> {
        match &self.signed_data.encap_content_info.econtent {
            Some(econtent) => Some(econtent.value()),
            None => self.detached_content.as_deref(),
        }
    }

    #[must_use]
    pub fn signer_infos(&self) -> &[SignerInfo] {
        self.signed_data.signer_infos.0.as_slice()
    }

    /// Every X.509 certificate carried in the structure, in set order.
    #[must_use]
    pub fn certificates(&self) -> Vec<&Certificate> {
        self.signed_data
            .certificates
            .iter()
            .flat_map(|set| set.0.iter())
            .filter_map(|choice| match choice {
                CertificateChoices::Certificate(cert) => Some(cert),
                CertificateChoices::Other(_) => None,
            })
            .collect()
    }

    /// The embedded certificate a `SignerInfo` points at.
    #[must_use]
    pub fn signer_certificate(&self, signer_info: &SignerInfo) -> Option<&Certificate> {
        self.certificates()
            .into_iter()
            .find(|cert| identifies(&signer_info.sid, cert))
    }

    /// Appends `attribute` to the unsigned attributes of the only signer.
    pub fn add_unsigned_attribute(&mut self, attribute: Attribute) -> SignerResult<()> {
        let count = self.signer_infos().len();
        if count != 1 {
            return Err(SignerError::MultipleSignersUnsupported(count));
        }
        let mut infos = self.signed_data.signer_infos.0.clone().into_vec();
        let signer = &mut infos[0];
        let mut attrs = signer
            .unsigned_attrs
            .take()
            .map(SetOfVec::into_vec)
            .unwrap_or_default();
        attrs.push(attribute);
        signer.unsigned_attrs = Some(SetOfVec::try_from(attrs)?);
        self.signed_data.signer_infos = SignerInfos(SetOfVec::try_from(infos)?);
        Ok(())
    }
}

fn identifies(sid: &SignerIdentifier, cert: &Certificate) -> bool {
    match sid {
        SignerIdentifier::IssuerAndSerialNumber(isn) => {
            isn.issuer == cert.tbs_certificate.issuer
                && isn.serial_number == cert.tbs_certificate.serial_number
        }
        SignerIdentifier::SubjectKeyIdentifier(ski) => cert
            .tbs_certificate
            .extensions
            .iter()
            .flatten()
            .filter(|ext| ext.extn_id == ID_CE_SUBJECT_KEY_IDENTIFIER)
            .filter_map(|ext| {
                x509_cert::ext::pkix::SubjectKeyIdentifier::from_der(ext.extn_value.as_bytes())
                    .ok()
            })
            .any(|own| own.0 == ski.0),
    }
}

/// Values of the signed attribute `oid`, if present.
pub fn signed_attribute_values<'a>(
    signer_info: &'a SignerInfo,
    oid: &ObjectIdentifier,
) -> impl Iterator<Item = &'a Any> + 'a {
    let oid = *oid;
    signer_info
        .signed_attrs
        .iter()
        .flat_map(|attrs| attrs.iter())
        .filter(move |attr| attr.oid == oid)
        .flat_map(|attr| attr.values.iter())
}

/// Values of the unsigned attribute `oid`, if present.
pub fn unsigned_attribute_values<'a>(
    signer_info: &'a SignerInfo,
    oid: &ObjectIdentifier,
) -> impl Iterator<Item = &'a Any> + 'a {
    let oid = *oid;
    signer_info
        .unsigned_attrs
        .iter()
        .flat_map(|attrs| attrs.iter())
        .filter(move |attr| attr.oid == oid)
        .flat_map(|attr| attr.values.iter())
}

/// The `signingTime` signed attribute, if present and well formed.
#[must_use]
pub fn signing_time(signer_info: &SignerInfo) -> Option<DateTime<Utc>> {
    signed_attribute_values(signer_info, &ID_SIGNING_TIME)
        .find_map(|value| value.to_der().ok().and_then(|der| Time::from_der(&der).ok()))
        .map(|time| DateTime::<Utc>::from(time.to_system_time()))
}

/// Builds a single-valued attribute.
pub fn attribute(oid: ObjectIdentifier, value: Any) -> SignerResult<Attribute> {
    Ok(Attribute {
        oid,
        values: SetOfVec::try_from(vec![value])?,
    })
}
