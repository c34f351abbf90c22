//! Adapter layer modules for external system integration.
//!
//! Provides adapters for:
//! - Status and info output channels
//! - Certificate stores (PEM bundle directory, in-memory)
//! - OpenSSL-backed CMS signing and verification
//! - HTTP timestamp authority communication

pub mod cert_store;
pub mod cms_engine;
pub mod output;
pub mod timestamp_http_client;
