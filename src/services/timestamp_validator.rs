//! Embedded timestamp validation.

use crate::adapters::cms_engine::CmsEngine;
use crate::domain::constants::ID_AA_TIME_STAMP_TOKEN;
use crate::domain::envelope::unsigned_attribute_values;
use crate::domain::timestamp::TimestampToken;
use chrono::{DateTime, Utc};
use cms::signed_data::SignerInfo;
use der::Encode;

/// Checks `id-aa-timeStampToken` attributes of signer infos.
pub struct TimestampValidator<'e> {
    engine: &'e dyn CmsEngine,
}

impl<'e> TimestampValidator<'e> {
    pub fn new(engine: &'e dyn CmsEngine) -> Self {
        Self { engine }
    }

    /// Verdict on the timestamps attached to `signer_info`.
    ///
    /// `None` when the signer carries no timestamp token. Otherwise every
    /// token must decode completely, be bound to the signer's signature
    /// value, carry a verifiable authority signature with the authority
    /// certificate embedded, and have a `genTime` inside
    /// `[not_before, not_after]` (inclusive; an absent bound is unchecked).
    #[must_use]
    pub fn check_timestamp(
        &self,
        signer_info: &SignerInfo,
        not_before: Option<DateTime<Utc>>,
        not_after: Option<DateTime<Utc>>,
    ) -> Option<bool> {
        let mut verdict = None;
        for value in unsigned_attribute_values(signer_info, &ID_AA_TIME_STAMP_TOKEN) {
            let valid = match self.validate(signer_info, value) {
                Some(token) => within(token.timestamp(), not_before, not_after),
                None => false,
            };
            if !valid {
                return Some(false);
            }
            verdict = Some(true);
        }
        verdict
    }

    /// Time of the first valid token attached to `signer_info`.
    #[must_use]
    pub fn timestamp_time(&self, signer_info: &SignerInfo) -> Option<DateTime<Utc>> {
        unsigned_attribute_values(signer_info, &ID_AA_TIME_STAMP_TOKEN)
            .find_map(|value| self.validate(signer_info, value))
            .map(|token| token.timestamp())
    }

    fn validate(&self, signer_info: &SignerInfo, value: &der::Any) -> Option<TimestampToken> {
        let token = match value.to_der().map(|der| TimestampToken::decode(&der)) {
            Ok(Ok(token)) => token,
            Ok(Err(e)) => {
                log::debug!("timestamp token rejected: {e}");
                return None;
            }
            Err(e) => {
                log::debug!("timestamp attribute unreadable: {e}");
                return None;
            }
        };
        if !token
            .is_bound_to(signer_info.signature.as_bytes())
            .unwrap_or(false)
        {
            log::debug!("timestamp token does not cover this signature");
            return None;
        }
        if token.signer_certificate().is_none() {
            log::debug!("timestamp token lacks the authority certificate");
            return None;
        }
        if let Err(e) = self.engine.verify(token.envelope()) {
            log::debug!("timestamp token signature: {e}");
            return None;
        }
        Some(token)
    }
}

fn within(
    time: DateTime<Utc>,
    not_before: Option<DateTime<Utc>>,
    not_after: Option<DateTime<Utc>>,
) -> bool {
    not_before.is_none_or(|start| time >= start) && not_after.is_none_or(|end| time <= end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn window_is_inclusive() {
        let t = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert!(within(t, Some(t), Some(t)));
        assert!(within(t, None, None));
        assert!(within(t, Some(t - Duration::seconds(1)), None));
        assert!(!within(t, Some(t + Duration::seconds(1)), None));
        assert!(!within(t, None, Some(t - Duration::seconds(1))));
        assert!(within(t, None, Some(t + Duration::seconds(1))));
    }
}
