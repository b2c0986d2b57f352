//! camstream wire format: the datagram layout shared with the streamer.
//!
//! Every datagram is a 9-byte header followed by a slice of one encoded
//! frame. The format carries no frame identifier; the receiver groups
//! chunks by arrival time.
//!
//! The header is a `#[repr(C)]` struct of unaligned fields so it can be read
//! and written with zerocopy derives. There is no unsafe code in this module.

use bytes::{BufMut, Bytes, BytesMut};
use static_assertions::assert_eq_size;
use zerocopy::byteorder::{LittleEndian, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

// ── Frame Header ─────────────────────────────────────────────────────────────

/// Header preceding every chunk of image data.
///
/// Wire size: 9 bytes.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct FrameHeader {
    /// Fixed marker, always `MAGIC`.
    pub magic: [u8; 3],

    /// Length of the chunk data that follows, little-endian.
    pub payload_length: U32<LittleEndian>,

    /// Zero-based position of this chunk within its frame.
    pub chunk_index: u8,

    /// Number of chunks composing the frame.
    pub total_chunks: u8,
}

assert_eq_size!(FrameHeader, [u8; HEADER_LEN]);

impl FrameHeader {
    pub fn new(payload_length: u32, chunk_index: u8, total_chunks: u8) -> Self {
        Self {
            magic: MAGIC,
            payload_length: U32::new(payload_length),
            chunk_index,
            total_chunks,
        }
    }
}

// ── Constants ─────────────────────────────────────────────────────────────────

/// Marker at offset 0 of every datagram.
pub const MAGIC: [u8; 3] = *b"CAM";

/// Size of `FrameHeader` on the wire.
pub const HEADER_LEN: usize = 9;

/// Largest datagram the streamer emits.
pub const MAX_PACKET_SIZE: usize = 60_000;

/// Header budget the streamer subtracts from `MAX_PACKET_SIZE` when sizing
/// chunks. One byte larger than `HEADER_LEN`; kept for byte-exact chunking.
pub const SENDER_HEADER_BUDGET: usize = 10;

/// Largest UDP payload the receiver will ever read.
pub const MAX_DATAGRAM: usize = 65_535;

/// Default cap on `total_chunks`. At 59990 bytes per chunk this admits
/// frames up to ~3.8 MB.
pub const DEFAULT_MAX_TOTAL_CHUNKS: u8 = 64;

// ── Chunk ─────────────────────────────────────────────────────────────────────

/// One validated datagram's contribution to a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_index: u8,
    pub total_chunks: u8,
    /// Exactly `payload_length` bytes, sliced from the datagram without copying.
    pub data: Bytes,
}

impl Chunk {
    pub fn payload_length(&self) -> u32 {
        self.data.len() as u32
    }

    /// A frame that fits in one datagram.
    pub fn is_whole_frame(&self) -> bool {
        self.total_chunks == 1
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Why a datagram was not accepted as a chunk.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("datagram of {0} bytes is too small to contain a header")]
    TooSmall(usize),

    #[error("invalid header marker {0:02x?}")]
    InvalidMagic([u8; 3]),

    #[error("declared length {declared} exceeds the {available} bytes received")]
    Truncated { declared: u32, available: usize },

    #[error("frame declares zero chunks")]
    ZeroChunks,

    #[error("frame declares {total} chunks, limit is {max}")]
    TooManyChunks { total: u8, max: u8 },

    #[error("chunk index {index} out of range for {total} chunks")]
    IndexOutOfRange { index: u8, total: u8 },
}

/// Validate a raw datagram and extract its chunk.
///
/// Checks run in wire order: size, marker, declared length, then the chunk
/// counts. Bytes past the declared payload are padding and are ignored.
pub fn parse_datagram(datagram: &Bytes, max_total_chunks: u8) -> Result<Chunk, RejectReason> {
    if datagram.len() < HEADER_LEN {
        return Err(RejectReason::TooSmall(datagram.len()));
    }

    // Length checked above, so the prefix read cannot fail.
    let header = FrameHeader::read_from_prefix(&datagram[..])
        .ok_or(RejectReason::TooSmall(datagram.len()))?;

    if header.magic != MAGIC {
        return Err(RejectReason::InvalidMagic(header.magic));
    }

    let declared = header.payload_length.get();
    let available = datagram.len() - HEADER_LEN;
    if (declared as u64) > available as u64 {
        return Err(RejectReason::Truncated {
            declared,
            available,
        });
    }

    let total = header.total_chunks;
    let index = header.chunk_index;
    if total == 0 {
        return Err(RejectReason::ZeroChunks);
    }
    if total > max_total_chunks {
        return Err(RejectReason::TooManyChunks {
            total,
            max: max_total_chunks,
        });
    }
    if index >= total {
        return Err(RejectReason::IndexOutOfRange { index, total });
    }

    Ok(Chunk {
        chunk_index: index,
        total_chunks: total,
        data: datagram.slice(HEADER_LEN..HEADER_LEN + declared as usize),
    })
}

// ── Encoding ──────────────────────────────────────────────────────────────────

/// Errors that can arise when packetizing a frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("packet size {0} leaves no room for chunk data")]
    PacketSizeTooSmall(usize),

    #[error("frame needs {needed} chunks, limit is {max}")]
    FrameTooLarge { needed: usize, max: u8 },
}

/// Encode a single datagram: header followed by `data`.
pub fn encode_chunk(data: &[u8], chunk_index: u8, total_chunks: u8) -> Bytes {
    let header = FrameHeader::new(data.len() as u32, chunk_index, total_chunks);
    let mut packet = BytesMut::with_capacity(HEADER_LEN + data.len());
    packet.put_slice(header.as_bytes());
    packet.put_slice(data);
    packet.freeze()
}

/// Split an encoded frame into datagrams the way the streamer does.
///
/// Frames that fit in `max_packet_size - SENDER_HEADER_BUDGET` bytes go out
/// as one datagram (`0 of 1`), otherwise as equal-sized chunks in index
/// order with a shorter tail.
pub fn split_frame(
    frame: &[u8],
    max_packet_size: usize,
    max_total_chunks: u8,
) -> Result<Vec<Bytes>, WireError> {
    let max_chunk = max_packet_size
        .checked_sub(SENDER_HEADER_BUDGET)
        .filter(|n| *n > 0)
        .ok_or(WireError::PacketSizeTooSmall(max_packet_size))?;

    if frame.len() <= max_chunk {
        return Ok(vec![encode_chunk(frame, 0, 1)]);
    }

    let needed = frame.len().div_ceil(max_chunk);
    if needed > max_total_chunks as usize {
        return Err(WireError::FrameTooLarge {
            needed,
            max: max_total_chunks,
        });
    }

    let total = needed as u8;
    Ok(frame
        .chunks(max_chunk)
        .enumerate()
        .map(|(index, data)| encode_chunk(data, index as u8, total))
        .collect())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
