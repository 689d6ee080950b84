use std::time::{Duration, Instant};

/// Decides when the engine emits a snapshot.
pub trait SnapshotTrigger: 'static {
    /// Return true if a snapshot should be emitted now
    fn should_trigger(&mut self) -> bool;

    /// Time left until the next snapshot is due. The engine blocks on the broker at most this
    /// long so a snapshot fires on schedule even when no data arrives.
    /// `None` means no deadline.
    fn remaining(&self) -> Option<Duration> {
        None
    }
}
impl<F> SnapshotTrigger for F
where
    F: FnMut() -> bool + 'static,
{
    fn should_trigger(&mut self) -> bool {
        self()
    }
}

/// A simple trigger which fires at constant interval based on processing time
pub struct IntervalTrigger {
    interval: Duration,
    last_trigger: Instant,
}

impl IntervalTrigger {
    /// Create a new trigger of the given interval
    pub fn new(interval: Duration) -> Self {
        IntervalTrigger {
            interval,
            last_trigger: Instant::now(),
        }
    }
}
impl SnapshotTrigger for IntervalTrigger {
    fn should_trigger(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_trigger) >= self.interval {
            self.last_trigger = now;
            true
        } else {
            false
        }
    }

    fn remaining(&self) -> Option<Duration> {
        Some(self.interval.saturating_sub(self.last_trigger.elapsed()))
    }
}

/// Never emits snapshots while running
pub struct NoTrigger;
impl SnapshotTrigger for NoTrigger {
    #[inline(always)]
    fn should_trigger(&mut self) -> bool {
        false
    }
}
