use super::{gib, ServerStats};
use std::io::{self, Write};
use std::time::{Duration, Instant};

/// Overwriting progress line plus a periodic high-water summary
///
/// Owns the reporting state: the heap watermark and the time of the last
/// summary line.
pub struct Reporter<W> {
    out: W,
    high_heap: u64,
    last_mark: Instant,
    summary_every: Duration,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, summary_every: Duration, now: Instant) -> Self {
        Self { out, high_heap: 0, last_mark: now, summary_every }
    }

    pub fn high_heap(&self) -> u64 {
        self.high_heap
    }

    /// Print one tick; returns whether the summary line was due and printed
    pub fn observe(
        &mut self,
        stats: &ServerStats,
        client_errors: u64,
        now: Instant,
    ) -> io::Result<bool> {
        self.high_heap = self.high_heap.max(stats.heap_size);

        write!(
            self.out,
            "\rheap: {:.3} GB, points: {:<10} groups: [{}:{}] ",
            gib(stats.heap_size),
            stats.num_objects,
            stats.num_hook_groups,
            stats.num_object_groups,
        )?;

        let due = now.saturating_duration_since(self.last_mark) > self.summary_every;
        if due {
            writeln!(
                self.out,
                "-- (high heap: {:.3} GB, client errs: {})",
                gib(self.high_heap),
                client_errors
            )?;
            self.last_mark = now;
        }
        self.out.flush()?;
        Ok(due)
    }

    /// End the in-place line so later output starts clean
    pub fn finish(&mut self) -> io::Result<()> {
        writeln!(self.out)?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
