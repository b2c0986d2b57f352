//! Frame selector: delivers only the newest complete frame.
//!
//! Several frames can finish between two passes. Older ones are dropped:
//! for a live view a skipped frame is better than a late one. Single-datagram
//! frames never enter the table; they are offered here directly and compete
//! with complete table entries on key.

use bytes::Bytes;

use crate::frame_table::{FrameKey, FrameTable};

/// A fully reassembled, not yet decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteFrame {
    pub key: FrameKey,
    pub total_chunks: usize,
    pub payload: Bytes,
}

/// Result of one selection pass.
#[derive(Debug, Default)]
pub struct Selection {
    pub winner: Option<CompleteFrame>,
    /// Complete frames dropped in favour of the winner.
    pub superseded: usize,
}

#[derive(Debug, Default)]
pub struct FrameSelector {
    pending: Vec<CompleteFrame>,
}

impl FrameSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand over a frame that arrived whole.
    pub fn offer(&mut self, frame: CompleteFrame) {
        self.pending.push(frame);
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Pick the complete frame with the largest key and remove every
    /// candidate from the table.
    ///
    /// On equal keys a frame offered directly beats a table entry, and later
    /// offers beat earlier ones, since they arrived last.
    pub fn select(&mut self, table: &mut FrameTable) -> Selection {
        let offered = std::mem::take(&mut self.pending);
        let complete = table.scan_complete();
        let candidates = offered.len() + complete.len();
        if candidates == 0 {
            return Selection::default();
        }

        let best_offered = offered
            .into_iter()
            .reduce(|best, next| if next.key >= best.key { next } else { best });
        let best_table = complete.iter().copied().max();

        let winner = match (best_offered, best_table) {
            (Some(frame), Some(key)) if key > frame.key => table_frame(table, key),
            (Some(frame), _) => Some(frame),
            (None, Some(key)) => table_frame(table, key),
            (None, None) => None,
        };

        for key in complete {
            table.remove(key);
        }

        Selection {
            winner,
            superseded: candidates - 1,
        }
    }
}

fn table_frame(table: &FrameTable, key: FrameKey) -> Option<CompleteFrame> {
    table.get(key).map(|entry| CompleteFrame {
        key,
        total_chunks: entry.total_chunks(),
        payload: entry.assemble(),
    })
}
