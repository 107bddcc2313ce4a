//! Lease expiry arithmetic.

use crate::lease::DateTime;
use chrono::Duration;

/// Check whether a lease renewed at `renew_time` for `lease_duration_seconds`
/// is stale at `now`.
///
/// The lease stays valid for `grace` past its nominal expiry to absorb clock
/// skew between processes and the latency between reading the record and
/// acting on it. A lease missing either timing field is always expired.
///
/// # Examples
///
/// ```rust
/// use electorate::expiry::is_expired;
/// use chrono::{Duration, Utc};
///
/// let renewed = Utc::now();
/// let grace = Duration::seconds(2);
///
/// assert!(!is_expired(Some(renewed), Some(15), renewed + Duration::seconds(16), grace));
/// assert!(is_expired(Some(renewed), Some(15), renewed + Duration::seconds(18), grace));
/// assert!(is_expired(None, Some(15), renewed, grace));
/// ```
pub fn is_expired(
    renew_time: Option<DateTime>,
    lease_duration_seconds: Option<u32>,
    now: DateTime,
    grace: Duration,
) -> bool {
    let (Some(renew_time), Some(duration)) = (renew_time, lease_duration_seconds) else {
        return true;
    };

    let expiry = renew_time
        .checked_add_signed(Duration::seconds(i64::from(duration)))
        .and_then(|t| t.checked_add_signed(grace));

    match expiry {
        Some(expiry) => now > expiry,
        // Past the representable range, so it will not expire in our lifetime.
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const DURATION: u32 = 15;

    fn grace() -> Duration {
        Duration::seconds(2)
    }

    #[test]
    fn test_within_grace_is_not_expired() {
        let t = Utc::now();
        let now = t + Duration::seconds(i64::from(DURATION)) + grace() - Duration::seconds(1);
        assert!(!is_expired(Some(t), Some(DURATION), now, grace()));
    }

    #[test]
    fn test_past_grace_is_expired() {
        let t = Utc::now();
        let now = t + Duration::seconds(i64::from(DURATION)) + grace() + Duration::seconds(1);
        assert!(is_expired(Some(t), Some(DURATION), now, grace()));
    }

    #[test]
    fn test_exact_boundary_is_not_expired() {
        let t = Utc::now();
        let now = t + Duration::seconds(i64::from(DURATION)) + grace();
        assert!(!is_expired(Some(t), Some(DURATION), now, grace()));
    }

    #[test]
    fn test_missing_fields_are_expired() {
        let now = Utc::now();
        assert!(is_expired(None, Some(DURATION), now, grace()));
        assert!(is_expired(Some(now), None, now, grace()));
        assert!(is_expired(None, None, now, grace()));
    }

    #[test]
    fn test_zero_grace() {
        let t = Utc::now();
        let now = t + Duration::seconds(i64::from(DURATION)) + Duration::milliseconds(1);
        assert!(is_expired(Some(t), Some(DURATION), now, Duration::zero()));
    }

    #[test]
    fn test_renew_time_in_future_is_not_expired() {
        // Another process with a fast clock renewed "ahead" of us.
        let now = Utc::now();
        let renew = now + Duration::seconds(5);
        assert!(!is_expired(Some(renew), Some(DURATION), now, grace()));
    }
}
