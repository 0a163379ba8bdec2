//! Exponential backoff with bounded partial jitter.

use std::time::Duration;

use super::BackoffJitter;

/// Retry delay policy.
///
/// The base delay doubles per attempt from `base` up to `cap`. Jitter adds at
/// most `min(jitter_ceiling, jitter_percent% of the base delay)`, never
/// subtracts, so retries never collapse towards zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub base: Duration,
    /// Upper bound on the exponential component.
    pub cap: Duration,
    /// Absolute upper bound on added jitter.
    pub jitter_ceiling: Duration,
    /// Jitter bound as a percentage of the base delay.
    pub jitter_percent: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            cap: Duration::from_millis(8_000),
            jitter_ceiling: Duration::from_millis(400),
            jitter_percent: 25,
        }
    }
}

impl BackoffPolicy {
    /// Exponential delay for the zero-based `attempt`, before jitter.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use stop_locator::domain::BackoffPolicy;
    ///
    /// let policy = BackoffPolicy::default();
    /// assert_eq!(policy.base_delay(0), Duration::from_millis(500));
    /// assert_eq!(policy.base_delay(3), Duration::from_millis(4_000));
    /// assert_eq!(policy.base_delay(9), Duration::from_millis(8_000));
    /// ```
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let base_ms = duration_millis(self.base);
        let cap_ms = duration_millis(self.cap);
        let factor = 2_u64.saturating_pow(attempt);
        Duration::from_millis(base_ms.saturating_mul(factor).min(cap_ms))
    }

    /// Largest jitter that may be added to `base_delay`.
    pub fn jitter_bound(&self, base_delay: Duration) -> Duration {
        let proportional =
            duration_millis(base_delay).saturating_mul(u64::from(self.jitter_percent)) / 100;
        Duration::from_millis(proportional.min(duration_millis(self.jitter_ceiling)))
    }

    /// Wait before retrying after the zero-based `attempt` failed.
    ///
    /// A server hint is a floor: the result is the larger of the hint and the
    /// jittered backoff.
    pub fn delay_for(
        &self,
        attempt: u32,
        server_hint: Option<Duration>,
        jitter: &dyn BackoffJitter,
    ) -> Duration {
        let base = self.base_delay(attempt);
        let jittered = jitter.jittered_delay(base, self.jitter_bound(base));
        server_hint.map_or(jittered, |hint| hint.max(jittered))
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
