//! Throwaway certificate hierarchy minted with OpenSSL.

use chrono::{DateTime, Duration, Utc};
use der::Decode;
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::extension::{BasicConstraints, SubjectAlternativeName};
use openssl::x509::{X509Name, X509NameBuilder, X509};
use smime_signer::adapters::cert_store::{MemoryStore, Signer, StoredCertificate};
use std::sync::atomic::{AtomicU32, Ordering};
use x509_cert::Certificate;

static SERIAL: AtomicU32 = AtomicU32::new(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Ec,
    Rsa,
}

pub fn new_key(kind: KeyKind) -> PKey<Private> {
    match kind {
        KeyKind::Ec => {
            let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
            PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
        }
        KeyKind::Rsa => PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap(),
    }
}

fn name(common_name: &str, email: Option<&str>) -> X509Name {
    let mut builder = X509NameBuilder::new().unwrap();
    builder
        .append_entry_by_nid(Nid::COMMONNAME, common_name)
        .unwrap();
    if let Some(email) = email {
        builder
            .append_entry_by_nid(Nid::PKCS9_EMAILADDRESS, email)
            .unwrap();
    }
    builder.build()
}

fn asn1_time(t: DateTime<Utc>) -> Asn1Time {
    Asn1Time::from_unix(t.timestamp()).unwrap()
}

/// A certificate with its private key.
pub struct Issued {
    pub x509: X509,
    pub key: PKey<Private>,
}

impl Issued {
    pub fn certificate(&self) -> Certificate {
        Certificate::from_der(&self.x509.to_der().unwrap()).unwrap()
    }

    /// Certificate, then `chain`, then the PKCS#8 key when `with_key`.
    pub fn pem_bundle(&self, chain: &[&X509], with_key: bool) -> Vec<u8> {
        let mut out = self.x509.to_pem().unwrap();
        for cert in chain {
            out.extend(cert.to_pem().unwrap());
        }
        if with_key {
            out.extend(self.key.private_key_to_pem_pkcs8().unwrap());
        }
        out
    }
}

/// Options for a leaf certificate.
pub struct LeafSpec<'a> {
    pub common_name: &'a str,
    pub email: Option<&'a str>,
    pub san_email: Option<&'a str>,
    pub kind: KeyKind,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl<'a> LeafSpec<'a> {
    pub fn new(common_name: &'a str, email: &'a str) -> Self {
        let now = Utc::now();
        Self {
            common_name,
            email: Some(email),
            san_email: None,
            kind: KeyKind::Ec,
            not_before: now - Duration::days(1),
            not_after: now + Duration::days(365),
        }
    }

    pub fn kind(mut self, kind: KeyKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn validity(mut self, not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> Self {
        self.not_before = not_before;
        self.not_after = not_after;
        self
    }
}

/// Self-signed root that issues test certificates.
pub struct TestPki {
    pub root: Issued,
}

impl TestPki {
    pub fn new(kind: KeyKind) -> Self {
        let key = new_key(kind);
        let subject = name("Test Root CA", None);
        let now = Utc::now();
        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        let serial = BigNum::from_u32(SERIAL.fetch_add(1, Ordering::Relaxed))
            .unwrap()
            .to_asn1_integer()
            .unwrap();
        builder.set_serial_number(&serial).unwrap();
        builder.set_subject_name(&subject).unwrap();
        builder.set_issuer_name(&subject).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder
            .set_not_before(&asn1_time(now - Duration::days(30)))
            .unwrap();
        builder
            .set_not_after(&asn1_time(now + Duration::days(3650)))
            .unwrap();
        builder
            .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
            .unwrap();
        builder.sign(&key, MessageDigest::sha256()).unwrap();
        Self {
            root: Issued {
                x509: builder.build(),
                key,
            },
        }
    }

    pub fn issue(&self, spec: &LeafSpec<'_>) -> Issued {
        let key = new_key(spec.kind);
        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        let serial = BigNum::from_u32(SERIAL.fetch_add(1, Ordering::Relaxed))
            .unwrap()
            .to_asn1_integer()
            .unwrap();
        builder.set_serial_number(&serial).unwrap();
        builder
            .set_subject_name(&name(spec.common_name, spec.email))
            .unwrap();
        builder
            .set_issuer_name(self.root.x509.subject_name())
            .unwrap();
        builder.set_pubkey(&key).unwrap();
        builder.set_not_before(&asn1_time(spec.not_before)).unwrap();
        builder.set_not_after(&asn1_time(spec.not_after)).unwrap();
        if let Some(san) = spec.san_email {
            let ext = SubjectAlternativeName::new()
                .email(san)
                .build(&builder.x509v3_context(Some(&self.root.x509), None))
                .unwrap();
            builder.append_extension(ext).unwrap();
        }
        builder.sign(&self.root.key, MessageDigest::sha256()).unwrap();
        Issued {
            x509: builder.build(),
            key,
        }
    }

    /// Leaf as a store entry: certificate, root in the chain, private key.
    pub fn stored(&self, leaf: &Issued) -> StoredCertificate {
        StoredCertificate::new(
            leaf.certificate(),
            vec![Certificate::from_der(&self.root.x509.to_der().unwrap()).unwrap()],
            Some(leaf.key.clone()),
        )
    }

    pub fn signer(&self, leaf: &Issued) -> Signer {
        Signer::try_from(self.stored(leaf)).unwrap()
    }
}

/// Root plus one EC leaf for `alice@example.com`, held in a memory store.
pub struct Fixture {
    pub pki: TestPki,
    pub alice: Issued,
    pub store: MemoryStore,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_leaf(LeafSpec::new("Alice", "alice@example.com"))
    }

    pub fn with_leaf(spec: LeafSpec<'_>) -> Self {
        let pki = TestPki::new(KeyKind::Ec);
        let alice = pki.issue(&spec);
        let store = MemoryStore::new(vec![pki.stored(&alice)]);
        Self { pki, alice, store }
    }
}
