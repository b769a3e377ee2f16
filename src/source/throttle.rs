//! Request pacing with uniform jitter

use crate::state::SourceState;
use rand::Rng;
use std::time::{Duration, Instant};

/// Enforces a randomized gap between successive calls to one source
#[derive(Debug, Clone)]
pub struct Throttle {
    state: SourceState,
    min_gap: Duration,
    max_gap: Duration,
}

impl Throttle {
    /// Creates a throttle drawing gaps uniformly from `[min_ms, max_ms]`
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            state: SourceState::new(),
            min_gap: Duration::from_millis(min_ms),
            max_gap: Duration::from_millis(max_ms.max(min_ms)),
        }
    }

    /// Waits until the next call is allowed, then records it
    ///
    /// The first call of a run never waits.
    pub async fn acquire(&mut self) {
        if let Some(wait) = self.state.time_until_next_request(Instant::now()) {
            tokio::time::sleep(wait).await;
        }
        let gap = self.draw_gap();
        self.state.record_request(Instant::now(), gap);
    }

    /// Calls made through this throttle so far
    pub fn request_count(&self) -> u32 {
        self.state.request_count
    }

    fn draw_gap(&self) -> Duration {
        if self.max_gap <= self.min_gap {
            return self.min_gap;
        }
        rand::thread_rng().gen_range(self.min_gap..=self.max_gap)
    }
}

/// Delay before retry number `attempt` (1-based): `base * attempt` plus jitter in `[0, base)`
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let jitter = if base.is_zero() {
        Duration::ZERO
    } else {
        rand::thread_rng().gen_range(Duration::ZERO..base)
    };
    base * attempt + jitter
}
