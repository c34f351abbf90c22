//! HTTP transport to RFC 3161 timestamp authorities.
//!
//! One POST per request, no retries and no client-side timeout beyond the
//! transport default. Status and media-type checks belong to the caller; the
//! transport only reports what came back.

use crate::domain::constants::{TIMESTAMP_QUERY_MEDIA_TYPE, TIMESTAMP_REPLY_MEDIA_TYPE};
use crate::domain::types::TimestampUrl;
use crate::infra::error::{SignerError, SignerResult};
use std::future::Future;

/// What an authority answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    /// `Content-Type` header, verbatim.
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl TransportResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends DER timestamp queries.
pub trait TimestampTransport {
    fn post(
        &self,
        url: &TimestampUrl,
        query: Vec<u8>,
    ) -> impl Future<Output = SignerResult<TransportResponse>> + Send;
}

/// reqwest-backed transport.
pub struct TimestampHttpClient {
    http: reqwest::Client,
}

impl TimestampHttpClient {
    pub fn new() -> SignerResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("smime-signer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SignerError::NetworkError(format!("HTTP client setup failed: {e}")))?;
        Ok(Self { http })
    }
}

impl TimestampTransport for TimestampHttpClient {
    async fn post(&self, url: &TimestampUrl, query: Vec<u8>) -> SignerResult<TransportResponse> {
        log::info!("requesting timestamp from {url}");
        let resp = self
            .http
            .post(url.as_url().clone())
            .header(reqwest::header::CONTENT_TYPE, TIMESTAMP_QUERY_MEDIA_TYPE)
            .header(reqwest::header::ACCEPT, TIMESTAMP_REPLY_MEDIA_TYPE)
            .body(query)
            .send()
            .await
            .map_err(|e| SignerError::NetworkError(format!("{url}: {e}")))?;

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = resp
            .bytes()
            .await
            .map_err(|e| SignerError::NetworkError(format!("reading reply from {url}: {e}")))?;
        log::debug!(
            "timestamp authority answered HTTP {status} ({} bytes, {:?})",
            body.len(),
            content_type
        );
        Ok(TransportResponse {
            status,
            content_type,
            body: body.to_vec(),
        })
    }
}
