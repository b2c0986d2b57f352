//! Time sources for the reassembler.
//!
//! The wire format has no frame id, so chunks are grouped by the whole
//! second in which they arrive. A `Clock` supplies both that key and a
//! monotonic instant for staleness checks.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::frame_table::FrameKey;

pub trait Clock {
    /// Monotonic time, used for entry age.
    fn now(&self) -> Instant;

    /// Arrival key for a chunk received right now.
    fn frame_key(&self) -> FrameKey;
}

/// Wall-clock seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn frame_key(&self) -> FrameKey {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    inner: Arc<Mutex<ManualState>>,
}

#[derive(Debug)]
struct ManualState {
    origin: Instant,
    base_key: FrameKey,
    elapsed: Duration,
}

impl ManualClock {
    pub fn new(base_key: FrameKey) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualState {
                origin: Instant::now(),
                base_key,
                elapsed: Duration::ZERO,
            })),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.elapsed += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.origin + state.elapsed
    }

    fn frame_key(&self) -> FrameKey {
        let state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.base_key + state.elapsed.as_secs()
    }
}
