//! Frame counter used by `test-throughput`.

use std::time::{Duration, Instant};

use sweeprec_core::FrameSink;

/// Counts frames and the time since it was created.
#[derive(Debug, Clone)]
pub struct ThroughputCounter {
    count: u64,
    started: Instant,
}

impl ThroughputCounter {
    pub fn new() -> Self {
        Self {
            count: 0,
            started: Instant::now(),
        }
    }

    pub fn tick(&mut self) {
        self.count += 1;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for ThroughputCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame content is dropped, only arrivals are counted
impl<I, F> FrameSink<I, F> for ThroughputCounter {
    fn sample(&mut self, _info: I, _frame: F) {
        self.tick();
    }
}
