use crate::config::ReconnectConfig;
use rand::Rng;
use std::time::Duration;

/// Reopen pacing after transient disconnects.
///
/// Delays grow exponentially with ±25% jitter up to a ceiling. A retry
/// budget caps how many consecutive reopens may happen without the session
/// reaching `open`; once spent, [`ReconnectPolicy::next_delay`] returns
/// `None` and the caller escalates.
#[derive(Debug)]
pub struct ReconnectPolicy {
    enabled: bool,
    initial: Duration,
    max: Duration,
    factor: f64,
    current: Duration,
    max_retries: u32,
    attempts: u32,
}

impl ReconnectPolicy {
    /// Creates a policy with the given parameters. `max_retries == 0` means
    /// unlimited.
    ///
    /// # Examples
    ///
    /// ```
    /// use wabot::backoff::ReconnectPolicy;
    /// use std::time::Duration;
    /// let mut policy = ReconnectPolicy::new(
    ///     Duration::from_millis(100),
    ///     Duration::from_millis(5000),
    ///     2.0,
    ///     3,
    /// );
    /// let delay = policy.next_delay().unwrap();
    /// assert!(delay >= Duration::from_millis(75)); // 100ms * 0.75 jitter
    /// assert!(delay <= Duration::from_millis(125)); // 100ms * 1.25 jitter
    /// ```
    #[must_use]
    pub const fn new(initial: Duration, max: Duration, factor: f64, max_retries: u32) -> Self {
        Self {
            enabled: true,
            initial,
            max,
            factor,
            current: initial,
            max_retries,
            attempts: 0,
        }
    }

    /// Reopen immediately with no delay, still honouring the retry budget.
    #[must_use]
    pub const fn immediate(max_retries: u32) -> Self {
        Self {
            enabled: false,
            initial: Duration::ZERO,
            max: Duration::ZERO,
            factor: 1.0,
            current: Duration::ZERO,
            max_retries,
            attempts: 0,
        }
    }

    /// Builds the policy from configuration.
    #[must_use]
    pub fn from_config(config: &ReconnectConfig) -> Self {
        if config.backoff {
            Self::new(
                Duration::from_millis(config.initial_delay_ms),
                Duration::from_millis(config.max_delay_ms),
                config.backoff_factor,
                config.max_retries,
            )
        } else {
            Self::immediate(config.max_retries)
        }
    }

    /// Consecutive reopen attempts since the last successful open.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    /// Compute the next delay (with jitter) and advance the internal state,
    /// or `None` when the retry budget is exhausted.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.max_retries != 0 && self.attempts >= self.max_retries {
            return None;
        }
        self.attempts += 1;

        if !self.enabled {
            return Some(Duration::ZERO);
        }

        let current_ms = self.current.as_millis().min(u128::from(u64::MAX)) as u64;

        let jitter_factor = rand::thread_rng().gen_range(0.75..=1.25);
        let delay = Duration::from_millis((current_ms as f64 * jitter_factor) as u64);

        let next_ms = (current_ms as f64 * self.factor) as u64;
        let max_ms = self.max.as_millis().min(u128::from(u64::MAX)) as u64;
        self.current = Duration::from_millis(next_ms.min(max_ms));

        Some(delay)
    }

    /// Restores the initial delay and the full retry budget.
    pub fn reset(&mut self) {
        self.current = self.initial;
        self.attempts = 0;
    }
}
