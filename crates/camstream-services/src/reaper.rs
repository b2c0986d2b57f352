//! Stale entry reaper: bounds memory held by frames that never complete.

use std::time::{Duration, Instant};

use crate::frame_table::FrameTable;

/// Default age after which an incomplete frame is dropped.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy)]
pub struct StaleReaper {
    threshold: Duration,
}

impl Default for StaleReaper {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_AFTER)
    }
}

impl StaleReaper {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Remove incomplete entries older than the threshold. Complete entries
    /// are left for the selector. Returns how many were evicted.
    pub fn reap(&self, table: &mut FrameTable, now: Instant) -> usize {
        let mut evicted = 0;
        table.retain(|key, entry| {
            let stale = !entry.is_complete()
                && now.saturating_duration_since(entry.created_at()) > self.threshold;
            if stale {
                tracing::debug!(
                    key,
                    received = entry.received_count(),
                    total = entry.total_chunks(),
                    "evicting stale frame buffer"
                );
                evicted += 1;
            }
            !stale
        });
        evicted
    }
}
