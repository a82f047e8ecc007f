use crate::model::Ms;

/// Seconds left on a cart hold: `max(0, ttl - floor((now - created_at) / 1000))`.
/// A `now` before `created_at` (clock skew) counts as no time elapsed.
pub fn remaining_seconds(created_at: Ms, now: Ms, ttl_seconds: u32) -> u32 {
    let elapsed = (now - created_at).max(0) / 1000;
    (i64::from(ttl_seconds) - elapsed).max(0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::DEFAULT_HOLD_TTL_SECONDS;

    const T0: Ms = 1_750_000_000_000;

    #[test]
    fn fresh_hold_has_full_ttl() {
        assert_eq!(remaining_seconds(T0, T0, DEFAULT_HOLD_TTL_SECONDS), 300);
    }

    #[test]
    fn expires_exactly_at_ttl() {
        assert_eq!(remaining_seconds(T0, T0 + 299_999, 300), 1);
        assert_eq!(remaining_seconds(T0, T0 + 300_000, 300), 0);
    }

    #[test]
    fn never_negative() {
        assert_eq!(remaining_seconds(T0, T0 + 500_000, 300), 0);
        assert_eq!(remaining_seconds(T0, T0 + Ms::MAX / 2, 300), 0);
    }

    #[test]
    fn two_minutes_in() {
        let left = remaining_seconds(T0, T0 + 120_000, 300);
        assert!((178..=180).contains(&left));
        assert_eq!(left, 180);
    }

    #[test]
    fn partial_seconds_round_down_elapsed() {
        assert_eq!(remaining_seconds(T0, T0 + 999, 300), 300);
        assert_eq!(remaining_seconds(T0, T0 + 1_000, 300), 299);
    }

    #[test]
    fn clock_skew_counts_as_zero_elapsed() {
        assert_eq!(remaining_seconds(T0, T0 - 60_000, 300), 300);
    }
}
