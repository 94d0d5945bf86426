//! Pull schedule - how long to wait between status requests

use std::time::Duration;

/// Poll every `interval` while elapsed time is below `until`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTier {
    pub until: Duration,
    pub interval: Duration,
}

/// Poll interval that grows with time since the transport started
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSchedule {
    tiers: Vec<PollTier>,
    tail: Duration,
}

impl PollSchedule {
    pub fn new(mut tiers: Vec<PollTier>, tail: Duration) -> Self {
        tiers.sort_by_key(|t| t.until);
        Self { tiers, tail }
    }

    /// A single fixed interval
    pub fn fixed(interval: Duration) -> Self {
        Self::new(Vec::new(), interval)
    }

    /// Delay before the next pull given the time elapsed since start
    pub fn interval_for(&self, elapsed: Duration) -> Duration {
        self.tiers
            .iter()
            .find(|t| elapsed < t.until)
            .map(|t| t.interval)
            .unwrap_or(self.tail)
    }
}

impl Default for PollSchedule {
    /// 3s for the first minute, 5s to 5 minutes, 10s to 15 minutes, then 30s
    fn default() -> Self {
        Self::new(
            vec![
                PollTier {
                    until: Duration::from_secs(60),
                    interval: Duration::from_secs(3),
                },
                PollTier {
                    until: Duration::from_secs(300),
                    interval: Duration::from_secs(5),
                },
                PollTier {
                    until: Duration::from_secs(900),
                    interval: Duration::from_secs(10),
                },
            ],
            Duration::from_secs(30),
        )
    }
}
