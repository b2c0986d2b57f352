//! camstream-core: wire format, chunk records, and configuration.
//! All other camstream crates depend on this one.

pub mod config;
pub mod wire;

pub use wire::{parse_datagram, split_frame, Chunk, RejectReason, WireError};
