//! Consumer boundary: where decoded frames leave the reassembler.
//!
//! `present` runs on the reassembly task and must return promptly. Slow
//! consumers should sit behind `LatestFrameSink`, which keeps only the
//! newest frame and never blocks.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;

use crate::frame_table::FrameKey;

/// A decoded frame handed to the consumer.
#[derive(Debug, Clone)]
pub struct DeliveredFrame<I> {
    pub key: FrameKey,
    pub total_chunks: usize,
    /// Size of the compressed payload.
    pub encoded_len: usize,
    pub image: I,
    pub delivered_at: Instant,
}

pub trait FrameSink<I> {
    fn present(&mut self, frame: DeliveredFrame<I>);
}

/// Collects every frame. Useful for replays and tests.
impl<I> FrameSink<I> for Vec<DeliveredFrame<I>> {
    fn present(&mut self, frame: DeliveredFrame<I>) {
        self.push(frame);
    }
}

/// Drop-oldest sink: subscribers see the most recent frame only.
pub struct LatestFrameSink<I> {
    tx: watch::Sender<Option<Arc<DeliveredFrame<I>>>>,
}

/// Receiving half of a `LatestFrameSink`.
pub type LatestFrameReceiver<I> = watch::Receiver<Option<Arc<DeliveredFrame<I>>>>;

impl<I> LatestFrameSink<I> {
    pub fn channel() -> (Self, LatestFrameReceiver<I>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }
}

impl<I> FrameSink<I> for LatestFrameSink<I> {
    fn present(&mut self, frame: DeliveredFrame<I>) {
        // Replaces any frame the consumer has not looked at yet.
        self.tx.send_replace(Some(Arc::new(frame)));
    }
}
