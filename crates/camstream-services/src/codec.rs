//! Codec boundary: turns a reassembled payload into an image.
//!
//! Decoding failure is a value, not a panic: the reassembler counts it and
//! moves on to the next frame.

use bytes::Bytes;
use image::{ImageFormat, RgbImage};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("frame payload is empty")]
    Empty,

    #[error("image decode failed: {0}")]
    Image(#[from] image::ImageError),
}

pub trait FrameDecoder {
    type Image;

    fn decode(&self, payload: &Bytes) -> Result<Self::Image, DecodeError>;
}

/// Decodes JPEG frames, as produced by the streamer, into RGB pixels.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegDecoder;

impl FrameDecoder for JpegDecoder {
    type Image = RgbImage;

    fn decode(&self, payload: &Bytes) -> Result<RgbImage, DecodeError> {
        if payload.is_empty() {
            return Err(DecodeError::Empty);
        }
        let image = image::load_from_memory_with_format(payload, ImageFormat::Jpeg)?;
        Ok(image.to_rgb8())
    }
}

/// Forwards the compressed bytes untouched, for consumers that decode or
/// record on their own.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughDecoder;

impl FrameDecoder for PassthroughDecoder {
    type Image = Bytes;

    fn decode(&self, payload: &Bytes) -> Result<Bytes, DecodeError> {
        if payload.is_empty() {
            return Err(DecodeError::Empty);
        }
        Ok(payload.clone())
    }
}
