//! RFC 3161 timestamping on the sign path and timestamp checks on verify.

mod common;

use chrono::{Duration, Utc};
use common::fake_tsa::{tsa_url, Behaviour, FakeTsa};
use common::pki::{Fixture, LeafSpec};
use smime_signer::adapters::cms_engine::OpensslCmsEngine;
use smime_signer::adapters::output::{MemorySink, OutputChannels, INFO_PREFIX};
use smime_signer::domain::constants::{ID_AA_TIME_STAMP_TOKEN, ID_SHA384};
use smime_signer::domain::envelope::{signing_time, unsigned_attribute_values, SignedEnvelope};
use smime_signer::domain::include_policy::CertificateIncludePolicy;
use smime_signer::domain::status::STATUS_PREFIX;
use smime_signer::infra::input::InputSource;
use smime_signer::services::TimestampValidator;
use smime_signer::{IdentityToken, SignRequest, SignWorkflow, SignerError, VerifyWorkflow};
use tempfile::TempDir;

fn request() -> SignRequest {
    SignRequest {
        identity: IdentityToken::parse("alice@example.com").unwrap(),
        content: b"timestamped content".to_vec(),
        timestamp_authority: Some(tsa_url()),
        detached: false,
        armor: false,
        include: CertificateIncludePolicy::default(),
    }
}

async fn sign_with(fx: &Fixture, tsa: FakeTsa) -> (Result<Vec<u8>, SignerError>, Vec<String>) {
    let engine = OpensslCmsEngine::new();
    let workflow = SignWorkflow::new(&fx.store, &engine, tsa);
    let status = MemorySink::new();
    let mut channels = OutputChannels::in_memory(&status, &MemorySink::new());
    let result = workflow.run(&mut channels, request()).await;
    (result, status.lines_without(STATUS_PREFIX))
}

#[tokio::test]
async fn token_is_embedded_and_bound_to_signature() {
    let fx = Fixture::new();
    let tsa = FakeTsa::new(&fx.pki);
    let (signed, status) = sign_with(&fx, tsa.clone()).await;
    let signed = signed.unwrap();
    assert_eq!(status[0], "BEGIN_SIGNING");
    assert!(status[1].starts_with("SIG_CREATED S "));

    let envelope = SignedEnvelope::decode(&signed, None).unwrap();
    let signer_info = &envelope.signer_infos()[0];
    assert!(signing_time(signer_info).is_none());
    assert_eq!(
        unsigned_attribute_values(signer_info, &ID_AA_TIME_STAMP_TOKEN).count(),
        1
    );

    let requests = tsa.requests();
    assert_eq!(requests.len(), 1);
    let sent = &requests[0];
    assert!(sent.cert_req);
    assert!(sent.nonce.is_some());
    assert_eq!(sent.message_imprint.hash_algorithm.algorithm, ID_SHA384);
    assert!(sent
        .message_imprint
        .matches(signer_info.signature.as_bytes())
        .unwrap());

    let engine = OpensslCmsEngine::new();
    let validator = TimestampValidator::new(&engine);
    assert_eq!(validator.timestamp_time(signer_info), Some(tsa.gen_time));
}

#[tokio::test]
async fn validity_window_is_inclusive() {
    let fx = Fixture::new();
    let tsa = FakeTsa::new(&fx.pki);
    let t = tsa.gen_time;
    let (signed, _) = sign_with(&fx, tsa).await;
    let envelope = SignedEnvelope::decode(&signed.unwrap(), None).unwrap();
    let si = &envelope.signer_infos()[0];

    let engine = OpensslCmsEngine::new();
    let validator = TimestampValidator::new(&engine);
    let second = Duration::seconds(1);
    assert_eq!(validator.check_timestamp(si, None, None), Some(true));
    assert_eq!(validator.check_timestamp(si, Some(t), Some(t)), Some(true));
    assert_eq!(validator.check_timestamp(si, Some(t + second), None), Some(false));
    assert_eq!(validator.check_timestamp(si, None, Some(t - second)), Some(false));
    assert_eq!(
        validator.check_timestamp(si, Some(t - second), Some(t + second)),
        Some(true)
    );
}

#[tokio::test]
async fn no_token_is_inconclusive() {
    let fx = Fixture::new();
    let engine = OpensslCmsEngine::new();
    let workflow = SignWorkflow::new(&fx.store, &engine, FakeTsa::new(&fx.pki));
    let mut req = request();
    req.timestamp_authority = None;
    let signed = workflow
        .run(&mut OutputChannels::silent(), req)
        .await
        .unwrap();
    let envelope = SignedEnvelope::decode(&signed, None).unwrap();
    let validator = TimestampValidator::new(&engine);
    assert_eq!(
        validator.check_timestamp(&envelope.signer_infos()[0], None, None),
        None
    );
}

#[tokio::test]
async fn verify_reports_timestamp_time() {
    let fx = Fixture::new();
    let tsa = FakeTsa::new(&fx.pki);
    let (signed, _) = sign_with(&fx, tsa).await;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ts.p7m");
    std::fs::write(&path, signed.unwrap()).unwrap();

    let engine = OpensslCmsEngine::new();
    let status = MemorySink::new();
    let info = MemorySink::new();
    let mut channels = OutputChannels::in_memory(&status, &info);
    VerifyWorkflow::new(&engine)
        .run(&mut channels, &[InputSource::File(path)])
        .unwrap();
    let info = info.lines_without(INFO_PREFIX);
    assert!(info
        .iter()
        .any(|l| l.starts_with("Signature timestamped by signing authority ")));
    assert!(!info.iter().any(|l| l.starts_with("Signature made at ")));
    assert_eq!(
        status.lines_without(STATUS_PREFIX).last().map(String::as_str),
        Some("TRUST_FULLY 0 shell")
    );
}

#[tokio::test]
async fn timestamp_outside_certificate_validity_fails_verify() {
    let now = Utc::now();
    let fx = Fixture::with_leaf(
        LeafSpec::new("Alice", "alice@example.com")
            .validity(now - Duration::days(10), now - Duration::days(5)),
    );
    let tsa = FakeTsa::new(&fx.pki);
    let (signed, _) = sign_with(&fx, tsa).await;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("late.p7m");
    std::fs::write(&path, signed.unwrap()).unwrap();

    let engine = OpensslCmsEngine::new();
    let status = MemorySink::new();
    let mut channels = OutputChannels::in_memory(&status, &MemorySink::new());
    let result = VerifyWorkflow::new(&engine).run(&mut channels, &[InputSource::File(path)]);
    assert!(matches!(result, Err(SignerError::TimestampInvalid(_))));
    let lines = status.lines_without(STATUS_PREFIX);
    assert_eq!(lines[0], "NEWSIG");
    assert!(lines[1].starts_with("BADSIG "));
    assert!(!lines.iter().any(|l| l.starts_with("TRUST_FULLY")));
}

#[tokio::test]
async fn http_error_status_is_authority_error() {
    let fx = Fixture::new();
    let tsa = FakeTsa::with_behaviour(
        &fx.pki,
        Behaviour {
            http_status: 503,
            ..Behaviour::default()
        },
    );
    let (result, status) = sign_with(&fx, tsa).await;
    assert!(matches!(
        result,
        Err(SignerError::TimestampAuthorityError { status: 503, .. })
    ));
    assert_eq!(status, ["BEGIN_SIGNING"]);
}

#[tokio::test]
async fn wrong_content_type_is_authority_error() {
    let fx = Fixture::new();
    let tsa = FakeTsa::with_behaviour(
        &fx.pki,
        Behaviour {
            content_type: Some("text/html".into()),
            ..Behaviour::default()
        },
    );
    let (result, _) = sign_with(&fx, tsa).await;
    assert!(matches!(
        result,
        Err(SignerError::TimestampAuthorityError { status: 200, .. })
    ));
}

#[tokio::test]
async fn rejected_request_is_invalid_timestamp() {
    let fx = Fixture::new();
    let tsa = FakeTsa::with_behaviour(
        &fx.pki,
        Behaviour {
            pki_status: 2,
            ..Behaviour::default()
        },
    );
    let (result, _) = sign_with(&fx, tsa).await;
    assert!(matches!(result, Err(SignerError::TimestampInvalid(_))));
}

#[tokio::test]
async fn echoed_nonce_must_match() {
    let fx = Fixture::new();
    let tsa = FakeTsa::with_behaviour(
        &fx.pki,
        Behaviour {
            wrong_nonce: true,
            ..Behaviour::default()
        },
    );
    let (result, status) = sign_with(&fx, tsa).await;
    assert!(matches!(result, Err(SignerError::TimestampInvalid(_))));
    assert!(!status.iter().any(|l| l.starts_with("SIG_CREATED")));
}

#[tokio::test]
async fn echoed_imprint_must_match() {
    let fx = Fixture::new();
    let tsa = FakeTsa::with_behaviour(
        &fx.pki,
        Behaviour {
            wrong_imprint: true,
            ..Behaviour::default()
        },
    );
    let (result, _) = sign_with(&fx, tsa).await;
    assert!(matches!(result, Err(SignerError::TimestampInvalid(_))));
}

#[tokio::test]
async fn authority_certificate_is_required() {
    let fx = Fixture::new();
    let tsa = FakeTsa::with_behaviour(
        &fx.pki,
        Behaviour {
            include_certificate: false,
            ..Behaviour::default()
        },
    );
    let (result, _) = sign_with(&fx, tsa).await;
    assert!(matches!(result, Err(SignerError::TimestampInvalid(_))));
}
