//! Gossip exchange statistics.
//!
//! Lightweight counters for completed and failed exchanges plus observed
//! latencies. Read by operators through the node; never consulted by the
//! protocol itself.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Accumulator for gossip request outcomes.
#[derive(Debug, Default)]
pub struct GossipStats {
    completed: AtomicU64,
    failed: AtomicU64,
    latencies_us: Mutex<Vec<u64>>,
}

impl GossipStats {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a completed exchange and its round-trip latency.
    pub fn record_completed(&self, latency: Duration) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.latencies_us.lock().push(latency.as_micros() as u64);
    }

    /// Records a failed exchange.
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A consistent copy of the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        let latencies = self.latencies_us.lock();
        let mean_latency = if latencies.is_empty() {
            None
        } else {
            let sum: u64 = latencies.iter().sum();
            Some(Duration::from_micros(sum / latencies.len() as u64))
        };
        StatsSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            mean_latency,
        }
    }
}

/// Point-in-time copy of the gossip counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Exchanges that completed
    pub completed: u64,
    /// Exchanges that failed in transport
    pub failed: u64,
    /// Mean round-trip latency of completed exchanges
    pub mean_latency: Option<Duration>,
}
