use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::config::AppConfig;

/// Timing rules for the refresh scheduler.
#[derive(Debug, Clone)]
pub struct RefreshPolicy {
    /// Floor for the delay between scheduled attempts.
    pub min_interval: Duration,
    /// Upper bound of the random delay added to scheduled attempts.
    pub jitter: Duration,
    /// Minimum spacing between out-of-band attempts.
    pub manual_cooldown: Duration,
    /// Time budget of a single attempt.
    pub timeout: Duration,
    /// Check the status endpoint before fetching the full envelope.
    pub probe_status: bool,
}

impl RefreshPolicy {
    /// Policy derived from configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            min_interval: Duration::from_secs(config.refresh.min_interval_secs),
            jitter: Duration::from_secs(config.refresh.jitter_secs),
            manual_cooldown: Duration::from_secs(config.refresh.manual_cooldown_secs),
            timeout: config.http_timeout(),
            probe_status: config.refresh.probe_status,
        }
    }

    /// Delay until the next scheduled attempt, before jitter.
    pub fn scheduled_delay(&self, now: DateTime<Utc>, next_refresh_at: DateTime<Utc>) -> Duration {
        let until = (next_refresh_at - now).to_std().unwrap_or(Duration::ZERO);
        until.max(self.min_interval)
    }

    /// Delay before retrying after a failure: the backoff delay, never below
    /// the floor, plus jitter.
    pub fn retry_delay(&self, backoff: Duration) -> Duration {
        backoff.max(self.min_interval) + self.sample_jitter()
    }

    /// Uniform random delay in `[0, jitter]`.
    pub fn sample_jitter(&self) -> Duration {
        let max = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=max))
    }
}

/// Capped exponential backoff with a degraded threshold.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    delay: Duration,
    failures: u32,
    degraded_after: u32,
}

impl Backoff {
    /// Backoff starting at `initial`, doubling up to `max`, degraded after
    /// `degraded_after` consecutive failures (at least one).
    pub fn new(initial: Duration, max: Duration, degraded_after: u32) -> Self {
        Self {
            initial,
            max,
            delay: initial,
            failures: 0,
            degraded_after: degraded_after.max(1),
        }
    }

    /// Backoff derived from configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            Duration::from_secs(config.backoff.initial_secs),
            Duration::from_secs(config.backoff.max_secs),
            config.backoff.degraded_after,
        )
    }

    /// Record a failure and return how long to wait before retrying.
    pub fn record_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let delay = self.delay;
        self.delay = (self.delay * 2).min(self.max);
        delay
    }

    /// Clear the failure streak. Returns `true` if the streak had reached the degraded threshold.
    pub fn reset(&mut self) -> bool {
        let was_degraded = self.is_degraded();
        self.failures = 0;
        self.delay = self.initial;
        was_degraded
    }

    /// Length of the current failure streak.
    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    /// Whether the streak reached the degraded threshold.
    pub fn is_degraded(&self) -> bool {
        self.failures >= self.degraded_after
    }

    /// `true` exactly on the failure that crossed the degraded threshold.
    pub fn just_degraded(&self) -> bool {
        self.failures == self.degraded_after
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn policy() -> RefreshPolicy {
        RefreshPolicy {
            min_interval: Duration::from_secs(5),
            jitter: Duration::from_secs(2),
            manual_cooldown: Duration::from_secs(10),
            timeout: Duration::from_secs(10),
            probe_status: false,
        }
    }

    #[test]
    fn scheduled_delay_follows_server_hint() {
        let now = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let delay = policy().scheduled_delay(now, now + ChronoDuration::minutes(10));
        assert_eq!(delay, Duration::from_secs(600));
    }

    #[test]
    fn scheduled_delay_is_floored() {
        let now = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        assert_eq!(
            policy().scheduled_delay(now, now + ChronoDuration::seconds(1)),
            Duration::from_secs(5)
        );
        // A refresh instant already in the past still waits for the floor.
        assert_eq!(
            policy().scheduled_delay(now, now - ChronoDuration::hours(1)),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn jitter_stays_in_bounds() {
        let policy = policy();
        for _ in 0..100 {
            assert!(policy.sample_jitter() <= policy.jitter);
        }
        let none = RefreshPolicy {
            jitter: Duration::ZERO,
            ..policy
        };
        assert_eq!(none.sample_jitter(), Duration::ZERO);
    }

    #[test]
    fn retries_never_undercut_the_floor() {
        let steady = RefreshPolicy {
            jitter: Duration::ZERO,
            ..policy()
        };
        assert_eq!(steady.retry_delay(Duration::from_secs(1)), Duration::from_secs(5));
        assert_eq!(steady.retry_delay(Duration::from_secs(40)), Duration::from_secs(40));

        let jittered = policy();
        for _ in 0..50 {
            let delay = jittered.retry_delay(Duration::from_secs(2));
            assert!(delay >= Duration::from_secs(5));
            assert!(delay <= Duration::from_secs(7));
        }
    }

    #[test]
    fn backoff_doubles_up_to_ceiling() {
        let mut backoff = Backoff::new(Duration::from_secs(2), Duration::from_secs(10), 3);
        let delays: Vec<_> = (0..5).map(|_| backoff.record_failure()).collect();
        assert_eq!(
            delays,
            [2, 4, 8, 10, 10].map(Duration::from_secs).to_vec()
        );
        assert_eq!(backoff.consecutive_failures(), 5);
    }

    #[test]
    fn degraded_threshold_fires_once_and_resets() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(8), 2);

        backoff.record_failure();
        assert!(!backoff.is_degraded());
        backoff.record_failure();
        assert!(backoff.just_degraded());
        backoff.record_failure();
        assert!(backoff.is_degraded() && !backoff.just_degraded());

        assert!(backoff.reset());
        assert_eq!(backoff.consecutive_failures(), 0);
        assert_eq!(backoff.record_failure(), Duration::from_secs(1));
    }
}
