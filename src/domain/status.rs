//! GnuPG status-line events.
//!
//! The calling tool parses a fixed subset of GnuPG's `--status-fd` grammar,
//! so each event is a closed variant with its fields in wire order and the
//! rendering lives in one `Display` impl.

use crate::domain::algorithm::AlgorithmCodes;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

/// Prefix carried by every status line.
pub const STATUS_PREFIX: &str = "[GNUPG:] ";

/// Signature form reported in `SIG_CREATED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureForm {
    Detached,
    Standard,
}

impl SignatureForm {
    #[must_use]
    pub fn from_detached(detached: bool) -> Self {
        if detached {
            Self::Detached
        } else {
            Self::Standard
        }
    }

    #[must_use]
    pub fn tag(self) -> char {
        match self {
            Self::Detached => 'D',
            Self::Standard => 'S',
        }
    }
}

/// One line of the status protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    NewSig,
    BeginSigning,
    SigCreated {
        form: SignatureForm,
        algorithms: AlgorithmCodes,
        created: DateTime<Utc>,
        fingerprint: String,
    },
    GoodSig {
        fingerprint: String,
        subject: String,
    },
    BadSig {
        fingerprint: String,
        subject: String,
    },
    ErrSig,
    TrustFully,
}

impl StatusEvent {
    /// The leading keyword of the line.
    #[must_use]
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::NewSig => "NEWSIG",
            Self::BeginSigning => "BEGIN_SIGNING",
            Self::SigCreated { .. } => "SIG_CREATED",
            Self::GoodSig { .. } => "GOODSIG",
            Self::BadSig { .. } => "BADSIG",
            Self::ErrSig => "ERRSIG",
            Self::TrustFully => "TRUST_FULLY",
        }
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())?;
        match self {
            Self::NewSig | Self::BeginSigning | Self::ErrSig => Ok(()),
            Self::SigCreated {
                form,
                algorithms,
                created,
                fingerprint,
            } => write!(
                f,
                " {} {} {} 00 {} {}",
                form.tag(),
                algorithms.public_key.code(),
                algorithms.hash.code(),
                created.to_rfc3339_opts(SecondsFormat::Secs, true),
                fingerprint
            ),
            Self::GoodSig {
                fingerprint,
                subject,
            }
            | Self::BadSig {
                fingerprint,
                subject,
            } => write!(f, " {fingerprint} {subject}"),
            // validation model token: X.509 trust rather than web of trust
            Self::TrustFully => f.write_str(" 0 shell"),
        }
    }
}
