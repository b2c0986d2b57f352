//! Receiver statistics: every drop is counted, none changes control flow.

use std::sync::atomic::{AtomicU64, Ordering};

use camstream_core::RejectReason;

use crate::receive::TransportCounters;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReceiverStats {
    pub datagrams: u64,

    // Malformed datagrams
    pub too_small: u64,
    pub invalid_magic: u64,
    pub truncated: u64,
    pub zero_chunks: u64,
    pub too_many_chunks: u64,

    // Chunks that parsed but could not be placed
    pub unrecognized_index: u64,
    pub duplicate_chunks: u64,

    pub frames_delivered: u64,
    pub frames_superseded: u64,
    pub decode_failures: u64,
    pub frames_evicted: u64,

    // Filled from the receive task's counters when a snapshot is taken
    pub transport_errors: u64,
    pub queue_overflows: u64,
}

impl ReceiverStats {
    pub fn record_reject(&mut self, reason: &RejectReason) {
        let counter = match reason {
            RejectReason::TooSmall(_) => &mut self.too_small,
            RejectReason::InvalidMagic(_) => &mut self.invalid_magic,
            RejectReason::Truncated { .. } => &mut self.truncated,
            RejectReason::ZeroChunks => &mut self.zero_chunks,
            RejectReason::TooManyChunks { .. } => &mut self.too_many_chunks,
            RejectReason::IndexOutOfRange { .. } => &mut self.unrecognized_index,
        };
        *counter += 1;
    }

    pub fn malformed(&self) -> u64 {
        self.too_small + self.invalid_magic + self.truncated + self.zero_chunks + self.too_many_chunks
    }

    /// Copy in the counters owned by the receive task.
    pub fn merge_transport(&mut self, transport: &TransportCounters) {
        self.transport_errors = transport.errors.load(Ordering::Relaxed);
        self.queue_overflows = transport.overflows.load(Ordering::Relaxed);
    }

    pub fn log(&self) {
        tracing::info!(
            datagrams = self.datagrams,
            delivered = self.frames_delivered,
            superseded = self.frames_superseded,
            evicted = self.frames_evicted,
            malformed = self.malformed(),
            unrecognized = self.unrecognized_index,
            duplicates = self.duplicate_chunks,
            decode_failures = self.decode_failures,
            transport_errors = self.transport_errors,
            queue_overflows = self.queue_overflows,
            "receiver stats"
        );
    }
}

pub(crate) fn bump(counter: &AtomicU64) -> u64 {
    counter.fetch_add(1, Ordering::Relaxed) + 1
}
