//! PEM armor codec for signed messages.
//!
//! Encoding always produces a single `BEGIN`/`END` block with the payload
//! wrapped at 64 base64 characters per line. Decoding is lenient about
//! whether the input is armored at all: text that does not look like a PEM
//! block is handed back untouched so callers can treat it as raw DER.

use crate::infra::error::{SignerError, SignerResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use regex::Regex;
use std::sync::LazyLock;

/// Base64 characters per armored body line.
pub const LINE_WIDTH: usize = 64;

static BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<header>-+\s?BEGIN[^-]+-+)\s*(?P<body>[^-]+)\s*(?P<footer>-+\s?END[^-]+-+)\s*$",
    )
    .expect("block pattern is a valid regex")
});

static LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(BEGIN|END)\s+(?P<label>[^-]+)").expect("label pattern is a valid regex")
});

/// A decoded armor block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PemBlock {
    pub label: String,
    pub body: Vec<u8>,
}

/// Outcome of [`try_decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<'a> {
    /// The input was a well-formed PEM block.
    Armored(PemBlock),
    /// The input did not match the block grammar; bytes are returned as-is.
    Raw(&'a [u8]),
}

impl Decoded<'_> {
    #[must_use]
    pub fn is_armored(&self) -> bool {
        matches!(self, Decoded::Armored(_))
    }

    /// `(success, body)` view: the payload when armored, else the original input.
    #[must_use]
    pub fn into_parts(self) -> (bool, Vec<u8>) {
        match self {
            Decoded::Armored(block) => (true, block.body),
            Decoded::Raw(bytes) => (false, bytes.to_vec()),
        }
    }
}

/// Wraps `bytes` in a `-----BEGIN {label}-----` / `-----END {label}-----` block.
///
/// The result has no trailing newline after the footer.
#[must_use]
pub fn encode(label: &str, bytes: &[u8]) -> String {
    let body = STANDARD.encode(bytes);
    let mut out = String::with_capacity(body.len() + body.len() / LINE_WIDTH + label.len() * 2 + 40);
    out.push_str("-----BEGIN ");
    out.push_str(label);
    out.push_str("-----\n");
    // base64 output is ASCII so byte chunks are valid UTF-8 boundaries
    for line in body.as_bytes().chunks(LINE_WIDTH) {
        out.push_str(&String::from_utf8_lossy(line));
        out.push('\n');
    }
    out.push_str("-----END ");
    out.push_str(label);
    out.push_str("-----");
    out
}

/// Attempts to strip PEM armor from `input`.
///
/// Returns [`Decoded::Raw`] when the input is not UTF-8 or does not match the
/// block grammar. A block whose header and footer labels differ, or whose
/// body is not valid base64, is an [`SignerError::InvalidArmor`] error.
pub fn try_decode(input: &[u8]) -> SignerResult<Decoded<'_>> {
    let Ok(text) = std::str::from_utf8(input) else {
        return Ok(Decoded::Raw(input));
    };
    let Some(caps) = BLOCK.captures(text) else {
        return Ok(Decoded::Raw(input));
    };

    let label_of = |part: &str| -> Option<String> {
        LABEL
            .captures(part)
            .and_then(|c| c.name("label"))
            .map(|m| m.as_str().trim().to_string())
    };
    let header = caps.name("header").map(|m| m.as_str()).unwrap_or_default();
    let footer = caps.name("footer").map(|m| m.as_str()).unwrap_or_default();
    let (Some(begin), Some(end)) = (label_of(header), label_of(footer)) else {
        return Ok(Decoded::Raw(input));
    };
    if !begin.eq_ignore_ascii_case(&end) {
        return Err(SignerError::InvalidArmor(format!(
            "header label '{begin}' does not match footer label '{end}'"
        )));
    }

    let body: String = caps
        .name("body")
        .map(|m| m.as_str())
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let body = STANDARD
        .decode(body.as_bytes())
        .map_err(|e| SignerError::InvalidArmor(format!("body is not valid base64: {e}")))?;

    log::debug!("decoded PEM block '{begin}' ({} bytes)", body.len());
    Ok(Decoded::Armored(PemBlock { label: begin, body }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_various_lengths() {
        for len in [0usize, 1, 47, 48, 49, 96, 1000] {
            let payload: Vec<u8> = (0..len).map(|i| (i * 31 % 256) as u8).collect();
            let armored = encode("SIGNED MESSAGE", &payload);
            let decoded = try_decode(armored.as_bytes()).unwrap();
            assert_eq!(decoded.into_parts(), (true, payload), "length {len}");
        }
    }

    #[test]
    fn encoded_lines_are_wrapped_at_64() {
        let armored = encode("SIGNED MESSAGE", &[0xAB; 200]);
        let lines: Vec<&str> = armored.lines().collect();
        assert_eq!(lines.first(), Some(&"-----BEGIN SIGNED MESSAGE-----"));
        assert_eq!(lines.last(), Some(&"-----END SIGNED MESSAGE-----"));
        let body = &lines[1..lines.len() - 1];
        assert!(body[..body.len() - 1].iter().all(|l| l.len() == LINE_WIDTH));
        assert!(body.last().is_some_and(|l| l.len() <= LINE_WIDTH));
        assert!(!armored.ends_with('\n'));
    }

    #[test]
    fn label_mismatch_is_hard_error() {
        let text = "-----BEGIN A-----\nSGVsbG8=\n-----END B-----";
        assert!(matches!(
            try_decode(text.as_bytes()),
            Err(SignerError::InvalidArmor(_))
        ));
        // Even when the body is garbage
        let text = "-----BEGIN A-----\n!!!!\n-----END B-----";
        assert!(matches!(
            try_decode(text.as_bytes()),
            Err(SignerError::InvalidArmor(_))
        ));
    }

    #[test]
    fn label_comparison_ignores_case_and_padding() {
        let text = "-----BEGIN Signed Message -----\nSGVsbG8=\n-----END SIGNED MESSAGE-----\n";
        let decoded = try_decode(text.as_bytes()).unwrap();
        match decoded {
            Decoded::Armored(block) => {
                assert_eq!(block.label, "Signed Message");
                assert_eq!(block.body, b"Hello");
            }
            Decoded::Raw(_) => panic!("expected an armored block"),
        }
    }

    #[test]
    fn bad_base64_is_hard_error() {
        let text = "-----BEGIN SIGNED MESSAGE-----\nSGVsbG8*\n-----END SIGNED MESSAGE-----";
        assert!(matches!(
            try_decode(text.as_bytes()),
            Err(SignerError::InvalidArmor(_))
        ));
    }

    #[test]
    fn whitespace_inside_body_is_ignored() {
        let text = "-----BEGIN X-----\r\n SGVs \t bG8=\r\n\r\n-----END X-----";
        let (ok, body) = try_decode(text.as_bytes()).unwrap().into_parts();
        assert!(ok);
        assert_eq!(body, b"Hello");
    }

    #[test]
    fn non_pem_input_falls_back_to_raw() {
        let der = [0x30u8, 0x82, 0x01, 0x00, 0xFF, 0xFE];
        let (ok, body) = try_decode(&der).unwrap().into_parts();
        assert!(!ok);
        assert_eq!(body, der);

        let text = b"just some text";
        let decoded = try_decode(text).unwrap();
        assert!(!decoded.is_armored());
        assert_eq!(decoded, Decoded::Raw(text));
    }
}
