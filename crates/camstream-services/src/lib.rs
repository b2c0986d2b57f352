//! camstream-services: frame reassembly and the receive/send plumbing
//! around it.
//!
//! The reassembly engine is single-owner: one `Reassembler` value holds the
//! frame table, selector, reaper, and statistics, and is moved into the task
//! that drains the datagram queue.

pub mod clock;
pub mod codec;
pub mod frame_table;
pub mod reaper;
pub mod reassembler;
pub mod receive;
pub mod selector;
pub mod send;
pub mod sink;
pub mod stats;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{DecodeError, FrameDecoder, JpegDecoder, PassthroughDecoder};
pub use frame_table::{FrameEntry, FrameKey, FrameTable, Ingest};
pub use reaper::StaleReaper;
pub use reassembler::Reassembler;
pub use receive::{bind_socket, reassembly_loop, receive_loop, Datagram, TransportCounters};
pub use selector::{CompleteFrame, FrameSelector, Selection};
pub use send::FrameSender;
pub use sink::{DeliveredFrame, FrameSink, LatestFrameSink};
pub use stats::ReceiverStats;
