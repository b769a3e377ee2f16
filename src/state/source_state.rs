use std::time::{Duration, Instant};

/// Tracks request pacing for one source during a run
///
/// The gap required before the next request is drawn when a request is
/// recorded, so a jittered delay is fixed once and then only counted down.
#[derive(Debug, Clone, Default)]
pub struct SourceState {
    /// Number of network calls made to this source in the current run
    pub request_count: u32,

    /// Timestamp of the last network call
    pub last_request_time: Option<Instant>,

    /// Gap that must elapse after `last_request_time`
    pub required_gap: Duration,
}

impl SourceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a network call and the gap the next call must respect
    pub fn record_request(&mut self, now: Instant, next_gap: Duration) {
        self.request_count += 1;
        self.last_request_time = Some(now);
        self.required_gap = next_gap;
    }

    /// Time left before the next call is allowed, `None` if allowed now
    pub fn time_until_next_request(&self, now: Instant) -> Option<Duration> {
        let last = self.last_request_time?;
        let elapsed = now.saturating_duration_since(last);
        (elapsed < self.required_gap).then(|| self.required_gap - elapsed)
    }
}
