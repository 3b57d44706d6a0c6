use std::time::Duration;

/// Fixed-delay retry schedule applied after the channel drops or the first
/// connect fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub delay: Duration,
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(3000);
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

    pub fn new(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts,
        }
    }

    /// Delay to wait before reconnect attempt `attempt` (1-based), or `None`
    /// once the budget is spent.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        (attempt >= 1 && attempt <= self.max_attempts).then_some(self.delay)
    }

    /// Longest time spent waiting before the policy gives up.
    pub fn total_budget(&self) -> Duration {
        self.delay * self.max_attempts
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY, Self::DEFAULT_MAX_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_ten_attempts_three_seconds_apart() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(3000)));
        assert_eq!(policy.delay_for(10), Some(Duration::from_millis(3000)));
        assert_eq!(policy.delay_for(11), None);
        assert_eq!(policy.delay_for(0), None);
        assert_eq!(policy.total_budget(), Duration::from_secs(30));
    }

    #[test]
    fn zero_attempts_never_retries() {
        let policy = ReconnectPolicy::new(Duration::from_millis(10), 0);
        assert_eq!(policy.delay_for(1), None);
    }
}
