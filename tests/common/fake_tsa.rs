//! In-process RFC 3161 authority.

use super::pki::{LeafSpec, TestPki};
use chrono::{DateTime, SubsecRound, Utc};
use const_oid::ObjectIdentifier;
use der::asn1::{GeneralizedTime, Int, Uint};
use der::{Any, Decode, Encode};
use smime_signer::adapters::cert_store::Signer;
use smime_signer::adapters::cms_engine::{CmsEngine, CmsSignOptions, OpensslCmsEngine};
use smime_signer::adapters::timestamp_http_client::{TimestampTransport, TransportResponse};
use smime_signer::domain::constants::{ID_CT_TST_INFO, TIMESTAMP_REPLY_MEDIA_TYPE};
use smime_signer::domain::include_policy::CertificateIncludePolicy;
use smime_signer::domain::timestamp::{PkiStatusInfo, TimeStampReq, TimeStampResp, TstInfo};
use smime_signer::domain::types::TimestampUrl;
use smime_signer::SignerResult;
use std::sync::{Arc, Mutex};

pub const POLICY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.55555.1.1");

/// Misbehaviours the authority can be told to show.
#[derive(Debug, Clone)]
pub struct Behaviour {
    pub http_status: u16,
    pub content_type: Option<String>,
    pub pki_status: u8,
    pub wrong_nonce: bool,
    pub wrong_imprint: bool,
    pub include_certificate: bool,
}

impl Default for Behaviour {
    fn default() -> Self {
        Self {
            http_status: 200,
            content_type: Some(TIMESTAMP_REPLY_MEDIA_TYPE.to_string()),
            pki_status: 0,
            wrong_nonce: false,
            wrong_imprint: false,
            include_certificate: true,
        }
    }
}

#[derive(Clone)]
pub struct FakeTsa {
    signer: Signer,
    pub gen_time: DateTime<Utc>,
    pub behaviour: Behaviour,
    requests: Arc<Mutex<Vec<TimeStampReq>>>,
}

impl FakeTsa {
    pub fn new(pki: &TestPki) -> Self {
        Self::with_behaviour(pki, Behaviour::default())
    }

    pub fn with_behaviour(pki: &TestPki, behaviour: Behaviour) -> Self {
        let leaf = pki.issue(&LeafSpec::new("Test TSA", "tsa@example.com"));
        Self {
            signer: pki.signer(&leaf),
            gen_time: Utc::now().trunc_subsecs(0),
            behaviour,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn at(mut self, gen_time: DateTime<Utc>) -> Self {
        self.gen_time = gen_time.trunc_subsecs(0);
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<TimeStampReq> {
        self.requests.lock().unwrap().clone()
    }

    fn respond(&self, query: &[u8]) -> TransportResponse {
        let request = TimeStampReq::from_der(query).expect("timestamp query must be DER");
        self.requests.lock().unwrap().push(request.clone());

        let mut imprint = request.message_imprint.clone();
        if self.behaviour.wrong_imprint {
            let mut bytes = imprint.hashed_message.as_bytes().to_vec();
            bytes[0] ^= 0xFF;
            imprint.hashed_message = der::asn1::OctetString::new(bytes).unwrap();
        }
        let nonce = if self.behaviour.wrong_nonce {
            Some(Uint::new(&[0x42; 8]).unwrap())
        } else {
            request.nonce.clone()
        };
        let gen_time = GeneralizedTime::from_date_time(
            der::DateTime::from_system_time(self.gen_time.into()).unwrap(),
        );
        let info = TstInfo {
            version: 1,
            policy: POLICY,
            message_imprint: imprint,
            serial_number: Int::new(&[0x01, 0x23]).unwrap(),
            gen_time,
            accuracy: None,
            ordering: false,
            nonce,
            tsa: None,
            extensions: None,
        };

        let include = if self.behaviour.include_certificate {
            CertificateIncludePolicy::EndEntityOnly
        } else {
            CertificateIncludePolicy::None
        };
        let options = CmsSignOptions::new(false, include).with_content_type(ID_CT_TST_INFO);
        let token = OpensslCmsEngine::new()
            .sign(&self.signer, &info.to_der().unwrap(), &options)
            .unwrap();

        let granted = self.behaviour.pki_status <= 1;
        let response = TimeStampResp {
            status: PkiStatusInfo {
                status: self.behaviour.pki_status,
                status_string: (!granted).then(|| vec!["request refused".to_string()]),
                fail_info: None,
            },
            time_stamp_token: granted.then(|| Any::from_der(&token.to_der().unwrap()).unwrap()),
        };
        TransportResponse {
            status: self.behaviour.http_status,
            content_type: self.behaviour.content_type.clone(),
            body: response.to_der().unwrap(),
        }
    }
}

impl TimestampTransport for FakeTsa {
    async fn post(&self, _url: &TimestampUrl, query: Vec<u8>) -> SignerResult<TransportResponse> {
        Ok(self.respond(&query))
    }
}

pub fn tsa_url() -> TimestampUrl {
    TimestampUrl::new("http://tsa.test/").unwrap()
}
