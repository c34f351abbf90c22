//! Which certificates travel with a signature (`--include-certs`).

use crate::infra::error::{SignerError, SignerResult};
use std::num::NonZeroUsize;

/// Certificate inclusion policy.
///
/// Built from the GnuPG `--include-certs` integer:
/// `-2` whole chain without the root, `-1` whole chain, `0` none,
/// `1` the signer only, `N > 1` at most `N` certificates starting at the signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CertificateIncludePolicy {
    None,
    EndEntityOnly,
    WholeChain,
    #[default]
    ExcludeRoot,
    UpTo(NonZeroUsize),
}

impl TryFrom<i32> for CertificateIncludePolicy {
    type Error = SignerError;

    fn try_from(value: i32) -> SignerResult<Self> {
        match value {
            -2 => Ok(Self::ExcludeRoot),
            -1 => Ok(Self::WholeChain),
            0 => Ok(Self::None),
            1 => Ok(Self::EndEntityOnly),
            n if n > 1 => usize::try_from(n)
                .ok()
                .and_then(NonZeroUsize::new)
                .map(Self::UpTo)
                .ok_or_else(|| SignerError::InvalidArgument(format!("--include-certs {n}"))),
            n => Err(SignerError::InvalidArgument(format!(
                "--include-certs {n} is not one of -2, -1, 0 or a positive count"
            ))),
        }
    }
}

impl CertificateIncludePolicy {
    /// Selects from `chain` (signer first, then issuers towards the root).
    ///
    /// `is_self_signed` tells whether a chain element is a root.
    pub fn select<'a, T>(
        self,
        chain: &'a [T],
        is_self_signed: impl Fn(&T) -> bool,
    ) -> Vec<&'a T> {
        match self {
            Self::None => Vec::new(),
            Self::EndEntityOnly => chain.iter().take(1).collect(),
            Self::WholeChain => chain.iter().collect(),
            Self::UpTo(n) => chain.iter().take(n.get()).collect(),
            Self::ExcludeRoot => {
                let mut keep = chain.len();
                // the signer stays even when it is its own root
                while keep > 1 && is_self_signed(&chain[keep - 1]) {
                    keep -= 1;
                }
                chain[..keep].iter().collect()
            }
        }
    }
}
