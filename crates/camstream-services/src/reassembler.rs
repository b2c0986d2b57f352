//! Reassembler: the owned receiver state driven by the reassembly loop.
//!
//! Holds the frame table, selector, and reaper together with the codec and
//! the consumer. Nothing here blocks or returns an error: every failure is
//! counted in `ReceiverStats` and the next datagram is processed as usual.

use bytes::Bytes;
use camstream_core::config::ReceiverConfig;
use camstream_core::{parse_datagram, Chunk};

use crate::clock::Clock;
use crate::codec::FrameDecoder;
use crate::frame_table::{FrameKey, FrameTable, Ingest};
use crate::reaper::StaleReaper;
use crate::selector::{CompleteFrame, FrameSelector};
use crate::sink::{DeliveredFrame, FrameSink};
use crate::stats::ReceiverStats;

pub struct Reassembler<C, D, S> {
    table: FrameTable,
    selector: FrameSelector,
    reaper: StaleReaper,
    max_total_chunks: u8,
    clock: C,
    decoder: D,
    sink: S,
    stats: ReceiverStats,
}

impl<C, D, S> Reassembler<C, D, S>
where
    C: Clock,
    D: FrameDecoder,
    S: FrameSink<D::Image>,
{
    pub fn new(config: &ReceiverConfig, clock: C, decoder: D, sink: S) -> Self {
        Self {
            table: FrameTable::new(),
            selector: FrameSelector::new(),
            reaper: StaleReaper::new(config.stale_after()),
            max_total_chunks: config.max_total_chunks,
            clock,
            decoder,
            sink,
            stats: ReceiverStats::default(),
        }
    }

    /// Parse one raw datagram and buffer its chunk. Malformed datagrams are
    /// counted and leave all state untouched.
    pub fn handle_datagram(&mut self, datagram: Bytes) {
        self.stats.datagrams += 1;
        match parse_datagram(&datagram, self.max_total_chunks) {
            Ok(chunk) => self.ingest(chunk),
            Err(reason) => {
                tracing::debug!(
                    %reason,
                    len = datagram.len(),
                    prefix = hex::encode(&datagram[..datagram.len().min(3)]),
                    "datagram rejected"
                );
                self.stats.record_reject(&reason);
            }
        }
    }

    /// Buffer a validated chunk. Single-datagram frames bypass the table and
    /// go straight to the selector.
    pub fn ingest(&mut self, chunk: Chunk) {
        let key = self.clock.frame_key();

        if chunk.is_whole_frame() {
            self.selector.offer(CompleteFrame {
                key,
                total_chunks: 1,
                payload: chunk.data,
            });
            return;
        }

        let index = chunk.chunk_index;
        match self.table.insert(key, chunk, self.clock.now()) {
            Ingest::Stored { complete } => {
                tracing::trace!(key, index, complete, "chunk buffered");
            }
            Ingest::Duplicate => {
                tracing::trace!(key, index, "duplicate chunk dropped");
                self.stats.duplicate_chunks += 1;
            }
            Ingest::Mismatched { expected, got } => {
                tracing::debug!(key, index, expected, got, "chunk count mismatch, dropped");
                self.stats.unrecognized_index += 1;
            }
        }
    }

    /// Deliver the newest complete frame, dropping older complete ones.
    /// Returns the delivered key, if any frame decoded.
    pub fn deliver(&mut self) -> Option<FrameKey> {
        let selection = self.selector.select(&mut self.table);
        if selection.superseded > 0 {
            tracing::debug!(dropped = selection.superseded, "older complete frames superseded");
            self.stats.frames_superseded += selection.superseded as u64;
        }

        let frame = selection.winner?;
        match self.decoder.decode(&frame.payload) {
            Ok(image) => {
                self.stats.frames_delivered += 1;
                self.sink.present(DeliveredFrame {
                    key: frame.key,
                    total_chunks: frame.total_chunks,
                    encoded_len: frame.payload.len(),
                    image,
                    delivered_at: self.clock.now(),
                });
                Some(frame.key)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    key = frame.key,
                    bytes = frame.payload.len(),
                    "failed to decode reassembled frame"
                );
                self.stats.decode_failures += 1;
                None
            }
        }
    }

    /// Evict incomplete frames past the staleness threshold.
    pub fn reap(&mut self) -> usize {
        let evicted = self.reaper.reap(&mut self.table, self.clock.now());
        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.table.len(), "cleaned up old buffers");
            self.stats.frames_evicted += evicted as u64;
        }
        evicted
    }

    /// One deliver-then-reap pass; run every loop cycle.
    pub fn tick(&mut self) {
        self.deliver();
        self.reap();
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut ReceiverStats {
        &mut self.stats
    }

    pub fn table(&self) -> &FrameTable {
        &self.table
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
