#![forbid(unsafe_code)]

//! Expiration policy shared by every keyspace.
//!
//! Keys carry an optional absolute deadline in unix milliseconds. Nothing
//! sweeps in the background: the store asks [`evaluate_expiry`] on every
//! access and drops the key when the deadline has passed.

/// Unix timestamps with this many decimal digits or fewer are read as seconds.
pub const MAX_SECONDS_TIMESTAMP_DIGITS: u32 = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryDecision {
    Live,
    Expired,
}

/// Outcome of `TTL`/`PTTL` style queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PttlValue {
    KeyMissing,
    NoExpiry,
    Remaining(i64),
}

impl PttlValue {
    /// Reply value in milliseconds: -2 missing, -1 persistent.
    #[must_use]
    pub fn as_millis_reply(self) -> i64 {
        match self {
            Self::KeyMissing => -2,
            Self::NoExpiry => -1,
            Self::Remaining(ms) => ms,
        }
    }

    /// Reply value in whole seconds, floored.
    #[must_use]
    pub fn as_seconds_reply(self) -> i64 {
        match self {
            Self::KeyMissing => -2,
            Self::NoExpiry => -1,
            Self::Remaining(ms) => ms.div_euclid(1000),
        }
    }
}

/// Where a TTL-setting command leaves the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// Keep the key and expire it at this unix-millisecond instant.
    At(u64),
    /// The deadline is not in the future: delete the key right away.
    Immediate,
}

#[must_use]
pub fn evaluate_expiry(expires_at_ms: Option<u64>, now_ms: u64) -> ExpiryDecision {
    match expires_at_ms {
        Some(deadline) if deadline <= now_ms => ExpiryDecision::Expired,
        _ => ExpiryDecision::Live,
    }
}

#[must_use]
pub fn is_expired(expires_at_ms: Option<u64>, now_ms: u64) -> bool {
    evaluate_expiry(expires_at_ms, now_ms) == ExpiryDecision::Expired
}

/// Remaining lifetime of a live key as seen at `now_ms`.
#[must_use]
pub fn remaining_ttl(expires_at_ms: Option<u64>, now_ms: u64) -> PttlValue {
    match expires_at_ms {
        None => PttlValue::NoExpiry,
        Some(deadline) if deadline <= now_ms => PttlValue::KeyMissing,
        Some(deadline) => {
            let remain = deadline - now_ms;
            PttlValue::Remaining(i64::try_from(remain).unwrap_or(i64::MAX))
        }
    }
}

#[must_use]
pub fn deadline_from_relative_ms(ttl_ms: i64, now_ms: u64) -> Deadline {
    if ttl_ms <= 0 {
        return Deadline::Immediate;
    }
    let ttl_ms = u64::try_from(ttl_ms).unwrap_or(u64::MAX);
    Deadline::At(now_ms.saturating_add(ttl_ms))
}

#[must_use]
pub fn deadline_from_relative_secs(seconds: i64, now_ms: u64) -> Deadline {
    let ttl_ms = seconds.checked_mul(1000).unwrap_or(if seconds.is_negative() {
        i64::MIN
    } else {
        i64::MAX
    });
    deadline_from_relative_ms(ttl_ms, now_ms)
}

/// Absolute deadline from a unix timestamp given in either seconds or
/// milliseconds; see [`normalize_unix_timestamp_ms`].
#[must_use]
pub fn deadline_from_unix(raw: i64, now_ms: u64) -> Deadline {
    let when_ms = normalize_unix_timestamp_ms(raw);
    if i128::from(when_ms) <= i128::from(now_ms) {
        return Deadline::Immediate;
    }
    Deadline::At(u64::try_from(when_ms).unwrap_or(u64::MAX))
}

/// Interpret `raw` as seconds when its absolute value has at most
/// [`MAX_SECONDS_TIMESTAMP_DIGITS`] decimal digits, otherwise as milliseconds.
#[must_use]
pub fn normalize_unix_timestamp_ms(raw: i64) -> i64 {
    if decimal_digits(raw.unsigned_abs()) <= MAX_SECONDS_TIMESTAMP_DIGITS {
        raw.saturating_mul(1000)
    } else {
        raw
    }
}

fn decimal_digits(mut value: u64) -> u32 {
    let mut digits = 1;
    while value >= 10 {
        value /= 10;
        digits += 1;
    }
    digits
}

#[cfg(test)]
mod tests {
    use super::{
        Deadline, ExpiryDecision, PttlValue, deadline_from_relative_ms,
        deadline_from_relative_secs, deadline_from_unix, decimal_digits, evaluate_expiry,
        normalize_unix_timestamp_ms, remaining_ttl,
    };
    use proptest::prelude::*;

    #[test]
    fn deadline_is_inclusive() {
        assert_eq!(evaluate_expiry(Some(1_000), 999), ExpiryDecision::Live);
        assert_eq!(evaluate_expiry(Some(1_000), 1_000), ExpiryDecision::Expired);
        assert_eq!(evaluate_expiry(None, u64::MAX), ExpiryDecision::Live);
    }

    #[test]
    fn seconds_reply_is_floored() {
        assert_eq!(PttlValue::Remaining(1_999).as_seconds_reply(), 1);
        assert_eq!(PttlValue::Remaining(999).as_seconds_reply(), 0);
        assert_eq!(PttlValue::KeyMissing.as_seconds_reply(), -2);
        assert_eq!(PttlValue::NoExpiry.as_millis_reply(), -1);
    }

    #[test]
    fn non_positive_relative_ttl_is_immediate() {
        assert_eq!(deadline_from_relative_ms(0, 10), Deadline::Immediate);
        assert_eq!(deadline_from_relative_secs(-5, 10), Deadline::Immediate);
        assert_eq!(deadline_from_relative_secs(2, 10), Deadline::At(2_010));
        assert_eq!(
            deadline_from_relative_secs(i64::MAX, 10),
            Deadline::At(10 + i64::MAX as u64)
        );
    }

    #[test]
    fn unix_timestamps_are_disambiguated_by_digit_count() {
        assert_eq!(decimal_digits(0), 1);
        assert_eq!(decimal_digits(99_999_999_999), 11);
        assert_eq!(normalize_unix_timestamp_ms(1_700_000_000), 1_700_000_000_000);
        assert_eq!(normalize_unix_timestamp_ms(99_999_999_999), 99_999_999_999_000);
        assert_eq!(normalize_unix_timestamp_ms(1_700_000_000_000), 1_700_000_000_000);
    }

    #[test]
    fn past_unix_deadline_is_immediate() {
        let now = 1_700_000_000_000;
        assert_eq!(deadline_from_unix(1_600_000_000, now), Deadline::Immediate);
        assert_eq!(
            deadline_from_unix(1_800_000_000, now),
            Deadline::At(1_800_000_000_000)
        );
        assert_eq!(
            deadline_from_unix(1_800_000_000_123, now),
            Deadline::At(1_800_000_000_123)
        );
    }

    #[test]
    fn remaining_ttl_reports_missing_past_deadline() {
        assert_eq!(remaining_ttl(Some(500), 100), PttlValue::Remaining(400));
        assert_eq!(remaining_ttl(Some(500), 500), PttlValue::KeyMissing);
        assert_eq!(remaining_ttl(None, 500), PttlValue::NoExpiry);
    }

    proptest! {
        #[test]
        fn remaining_ttl_decreases_until_expiry(ttl in 1_u64..1_000_000, step in 0_u64..1_000_000) {
            let start = 1_000_u64;
            let deadline = start + ttl;
            let now = start + step;
            match remaining_ttl(Some(deadline), now) {
                PttlValue::Remaining(ms) => {
                    prop_assert!(now < deadline);
                    prop_assert_eq!(ms as u64, deadline - now);
                }
                PttlValue::KeyMissing => prop_assert!(now >= deadline),
                PttlValue::NoExpiry => prop_assert!(false),
            }
        }
    }
}
