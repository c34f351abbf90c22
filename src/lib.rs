//! S/MIME Signer Library
//!
//! GnuPG-compatible signing and verification with X.509 certificates and
//! CMS signatures, so version-control tooling that drives `gpg` can use
//! S/MIME identities instead. Supports RFC 3161 timestamping.

pub mod adapters;
pub mod domain;
pub mod infra;
pub mod pipelines;
pub mod services;

pub use domain::status::StatusEvent;
pub use domain::types::{IdentityToken, TimestampUrl};
pub use infra::error::{SignerError, SignerResult};
pub use pipelines::{ListKeysWorkflow, SignRequest, SignWorkflow, VerifyWorkflow};
