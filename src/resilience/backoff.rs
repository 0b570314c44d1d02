//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Delay before retry number `attempt` (1-based): `base_ms * 2^(attempt-1)`,
/// capped at `max_ms`, plus up to 10% jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let capped = base_ms
        .saturating_mul(1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX))
        .min(max_ms);

    let jitter = match capped / 10 {
        0 => 0,
        range => rand::thread_rng().gen_range(0..range),
    };

    Duration::from_millis(capped + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        assert_eq!(calculate_backoff(0, 100, 2000), Duration::ZERO);

        let first = calculate_backoff(1, 100, 2000).as_millis();
        assert!((100..110).contains(&first), "got {}", first);

        let second = calculate_backoff(2, 100, 2000).as_millis();
        assert!((200..220).contains(&second), "got {}", second);

        let capped = calculate_backoff(10, 100, 1000).as_millis();
        assert!((1000..1100).contains(&capped), "got {}", capped);

        let huge = calculate_backoff(200, 100, 1000).as_millis();
        assert!((1000..1100).contains(&huge), "got {}", huge);
    }

    #[test]
    fn test_small_delays_have_no_jitter() {
        assert_eq!(calculate_backoff(1, 5, 100), Duration::from_millis(5));
    }
}
