//! Frame buffer table: in-progress multi-chunk frames keyed by arrival
//! second.
//!
//! Each entry owns a fixed-size slot vector sized at creation. A slot is
//! written at most once; later copies of the same chunk are dropped. Entries
//! leave the table exactly once, through `remove` (delivery) or `retain`
//! (eviction).

use std::collections::HashMap;
use std::time::Instant;

use bytes::{Bytes, BytesMut};
use camstream_core::Chunk;

/// Grouping key for chunks of one frame: arrival time in whole seconds.
pub type FrameKey = u64;

/// One frame being reassembled.
#[derive(Debug)]
pub struct FrameEntry {
    chunks: Vec<Option<Bytes>>,
    received: usize,
    created_at: Instant,
}

impl FrameEntry {
    pub fn new(total_chunks: u8, created_at: Instant) -> Self {
        Self {
            chunks: vec![None; total_chunks as usize],
            received: 0,
            created_at,
        }
    }

    pub fn total_chunks(&self) -> usize {
        self.chunks.len()
    }

    pub fn received_count(&self) -> usize {
        self.received
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn is_complete(&self) -> bool {
        self.received == self.chunks.len()
    }

    /// Bytes stored at `index`, if that chunk has arrived.
    pub fn chunk(&self, index: usize) -> Option<&Bytes> {
        self.chunks.get(index).and_then(Option::as_ref)
    }

    /// Concatenate the chunks in index order. Missing slots contribute
    /// nothing; callers only assemble complete entries.
    pub fn assemble(&self) -> Bytes {
        if let [Some(only)] = self.chunks.as_slice() {
            return only.clone();
        }
        let len = self.chunks.iter().flatten().map(Bytes::len).sum();
        let mut frame = BytesMut::with_capacity(len);
        for chunk in self.chunks.iter().flatten() {
            frame.extend_from_slice(chunk);
        }
        frame.freeze()
    }

    /// Store `data` in an empty slot. Returns false if the slot was taken or
    /// does not exist.
    fn fill(&mut self, index: u8, data: Bytes) -> bool {
        let Some(slot) = self.chunks.get_mut(index as usize) else {
            return false;
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(data);
        self.received += 1;
        true
    }
}

/// Outcome of adding a chunk to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    /// Stored in its slot. `complete` is true when this chunk finished the frame.
    Stored { complete: bool },
    /// Slot already held data; the chunk was dropped.
    Duplicate,
    /// The entry under this key was sized for a different chunk count, so
    /// the chunk cannot belong to it.
    Mismatched { expected: usize, got: u8 },
}

/// Keyed store of in-progress frames. Never blocks.
#[derive(Debug, Default)]
pub struct FrameTable {
    entries: HashMap<FrameKey, FrameEntry>,
}

impl FrameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `chunk` under `key`, creating the entry on first sight.
    pub fn insert(&mut self, key: FrameKey, chunk: Chunk, now: Instant) -> Ingest {
        let entry = self
            .entries
            .entry(key)
            .or_insert_with(|| FrameEntry::new(chunk.total_chunks, now));

        if entry.total_chunks() != chunk.total_chunks as usize {
            return Ingest::Mismatched {
                expected: entry.total_chunks(),
                got: chunk.total_chunks,
            };
        }

        if entry.fill(chunk.chunk_index, chunk.data) {
            Ingest::Stored {
                complete: entry.is_complete(),
            }
        } else {
            Ingest::Duplicate
        }
    }

    /// Keys of every complete entry, in no particular order.
    pub fn scan_complete(&self) -> Vec<FrameKey> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.is_complete())
            .map(|(key, _)| *key)
            .collect()
    }

    pub fn remove(&mut self, key: FrameKey) -> Option<FrameEntry> {
        self.entries.remove(&key)
    }

    pub fn get(&self, key: FrameKey) -> Option<&FrameEntry> {
        self.entries.get(&key)
    }

    /// Keep only entries for which `keep` returns true.
    pub fn retain(&mut self, keep: impl FnMut(&FrameKey, &mut FrameEntry) -> bool) {
        self.entries.retain(keep);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
