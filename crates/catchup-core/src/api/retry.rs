//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryPolicy;

/// Upper bound of the random jitter, as a fraction of the base delay.
const JITTER_RATIO: f64 = 0.1;

/// `min(max_delay, initial_delay * multiplier^attempt)`, without jitter.
pub fn base_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let seconds = policy.initial_delay.as_secs_f64() * policy.backoff_multiplier.powi(exponent);
    let capped = seconds.min(policy.max_delay.as_secs_f64());
    Duration::try_from_secs_f64(capped).unwrap_or(policy.max_delay)
}

/// Delay to sleep before retry number `attempt` (zero based).
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let base = base_delay(policy, attempt);
    base + jitter(base)
}

fn jitter(base: Duration) -> Duration {
    let ratio = rand::rng().random_range(0.0..=JITTER_RATIO);
    base.mul_f64(ratio)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1_000),
            backoff_multiplier: 2.0,
        }
    }

    #[test]
    fn base_delay_grows_geometrically_until_capped() {
        let policy = policy();
        let delays: Vec<u128> = (0..6)
            .map(|attempt| base_delay(&policy, attempt).as_millis())
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1_000, 1_000]);
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        let policy = policy();
        for attempt in 0..4 {
            let base = base_delay(&policy, attempt);
            for _ in 0..50 {
                let delay = backoff_delay(&policy, attempt);
                assert!(delay >= base);
                assert!(delay <= base + base / 10 + Duration::from_nanos(1));
            }
        }
    }

    #[test]
    fn huge_attempt_numbers_saturate_at_max_delay() {
        assert_eq!(base_delay(&policy(), u32::MAX), Duration::from_millis(1_000));
    }

    #[test]
    fn zero_initial_delay_never_sleeps() {
        let policy = RetryPolicy {
            initial_delay: Duration::ZERO,
            ..policy()
        };
        assert_eq!(backoff_delay(&policy, 3), Duration::ZERO);
    }
}
