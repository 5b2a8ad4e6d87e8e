use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters shared by every task of a run
///
/// Writers, the compaction trigger and the listener only add; the reporter
/// only reads. No invariant spans two counters.
#[derive(Debug)]
pub struct Metrics {
    writes: AtomicU64,
    compactions: AtomicU64,
    client_errors: AtomicU64,
    notifications: AtomicU64,
    high_heap: AtomicU64,
    started: Instant,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            writes: AtomicU64::new(0),
            compactions: AtomicU64::new(0),
            client_errors: AtomicU64::new(0),
            notifications: AtomicU64::new(0),
            high_heap: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_compaction(&self) {
        self.compactions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_client_error(&self) {
        self.client_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notification(&self) {
        self.notifications.fetch_add(1, Ordering::Relaxed);
    }

    /// Publish the reporter's watermark for the end-of-run report
    pub fn publish_high_heap(&self, heap: u64) {
        self.high_heap.fetch_max(heap, Ordering::Relaxed);
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn compactions(&self) -> u64 {
        self.compactions.load(Ordering::Relaxed)
    }

    pub fn client_errors(&self) -> u64 {
        self.client_errors.load(Ordering::Relaxed)
    }

    pub fn notifications(&self) -> u64 {
        self.notifications.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            writes: self.writes(),
            compactions: self.compactions(),
            client_errors: self.client_errors(),
            notifications: self.notifications(),
            high_heap: self.high_heap.load(Ordering::Relaxed),
            elapsed: self.started.elapsed(),
        }
    }
}

/// Point-in-time copy of [`Metrics`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    pub writes: u64,
    pub compactions: u64,
    pub client_errors: u64,
    pub notifications: u64,
    pub high_heap: u64,
    pub elapsed: Duration,
}

impl MetricsSnapshot {
    pub fn write_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.writes as f64 / secs
        } else {
            0.0
        }
    }

    pub fn print_report(&self) {
        println!("\n═══════════════════════════════════════════════════════════════");
        println!("  HEAPGROW RUN SUMMARY");
        println!("═══════════════════════════════════════════════════════════════");
        println!("  Duration:       {:.2}s", self.elapsed.as_secs_f64());
        println!("  Writes:         {} ({:.2} writes/sec)", self.writes, self.write_rate());
        println!("  Compactions:    {}", self.compactions);
        println!("  Notifications:  {}", self.notifications);
        println!("  Client errors:  {}", self.client_errors);
        println!("  High heap:      {:.3} GB", crate::stats::gib(self.high_heap));
        println!("═══════════════════════════════════════════════════════════════");
    }
}
