use std::time::Duration;

/// Ordered delays to wait before each retry.
///
/// Attempt 0 runs immediately; attempt `k` (k ≥ 1) runs after waiting
/// `delays[k - 1]`. A schedule with `n` delays therefore allows up to
/// `n + 1` attempts. The default schedule is empty: no retries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrySchedule {
    delays: Vec<Duration>,
}

impl RetrySchedule {
    /// Creates a schedule from explicit delays.
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// Creates a schedule from delays in milliseconds.
    pub fn from_millis(millis: &[u64]) -> Self {
        Self::new(millis.iter().map(|&ms| Duration::from_millis(ms)).collect())
    }

    /// Schedule that never retries.
    pub fn none() -> Self {
        Self::default()
    }

    /// Builds `retries` delays growing by `factor`, capped at `max`.
    ///
    /// Unlike connection backoff this schedule carries no jitter: the
    /// delays are exactly `initial * factor^k`, so callers and tests can
    /// rely on them.
    pub fn exponential(initial: Duration, factor: f64, max: Duration, retries: usize) -> Self {
        let max_secs = max.as_secs_f64();
        let delays = (0..retries)
            .map(|k| {
                let exp = k.min(63) as i32;
                let secs = initial.as_secs_f64() * factor.max(1.0).powi(exp);
                Duration::from_secs_f64(secs.min(max_secs))
            })
            .collect();
        Self { delays }
    }

    /// Returns the delay to wait before attempt `attempt` (0-based), or
    /// `None` if the schedule does not allow that attempt.
    pub fn delay_before(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 {
            return Some(Duration::ZERO);
        }
        self.delays.get(attempt as usize - 1).copied()
    }

    /// The configured delays.
    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    /// Number of retries (not attempts) this schedule permits.
    pub fn len(&self) -> usize {
        self.delays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }

    /// Sum of all delays: the longest time spent waiting if every retry is
    /// used.
    pub fn total_delay(&self) -> Duration {
        self.delays.iter().sum()
    }
}

impl From<Vec<Duration>> for RetrySchedule {
    fn from(delays: Vec<Duration>) -> Self {
        Self::new(delays)
    }
}
