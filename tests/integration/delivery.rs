use std::io::Cursor;
use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use camstream_core::wire::encode_chunk;
use camstream_services::{FrameSender, JpegDecoder, PassthroughDecoder};

use crate::*;

fn jpeg_frame(width: u32, height: u32) -> Result<Vec<u8>> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x ^ y) % 256) as u8])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img).write_to(&mut out, ImageFormat::Jpeg)?;
    Ok(out.into_inner())
}

/// A JPEG small enough for one datagram is decoded and delivered.
#[tokio::test]
async fn test_single_datagram_jpeg_is_delivered() -> Result<()> {
    let harness = start(test_config(), JpegDecoder)?;
    let sender = FrameSender::bind(&harness.sender_config(60_000)).await?;

    let frame = jpeg_frame(64, 48)?;
    assert_eq!(sender.send_frame(&frame).await?, 1);

    let done = harness.finish().await?;
    let frames = done.sink();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].image.dimensions(), (64, 48));
    assert_eq!(frames[0].total_chunks, 1);
    assert_eq!(frames[0].encoded_len, frame.len());
    assert!(done.table().is_empty());
    Ok(())
}

/// A JPEG split over many datagrams is reassembled and decoded.
#[tokio::test]
async fn test_chunked_jpeg_is_reassembled() -> Result<()> {
    let harness = start(test_config(), JpegDecoder)?;
    let sender = FrameSender::bind(&harness.sender_config(1_000)).await?;

    let frame = jpeg_frame(160, 120)?;
    let datagrams = sender.send_frame(&frame).await?;
    assert!(datagrams > 1, "frame should need several chunks");

    let done = harness.finish().await?;
    let frames = done.sink();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].image.dimensions(), (160, 120));
    assert_eq!(frames[0].total_chunks, datagrams);
    assert_eq!(done.stats().frames_delivered, 1);
    Ok(())
}

/// Chunks sent in reverse order, with a duplicate, still produce the
/// in-order payload exactly once.
#[tokio::test]
async fn test_reordered_and_duplicated_chunks() -> Result<()> {
    let harness = start(test_config(), PassthroughDecoder)?;
    let socket = raw_sender().await?;

    let parts: [&[u8]; 3] = [b"<zero>", b"<one>", b"<two>"];
    for index in [2u8, 1, 1, 0] {
        let packet = encode_chunk(parts[index as usize], index, 3);
        socket.send_to(&packet, harness.addr).await?;
    }

    let done = harness.finish().await?;
    let frames = done.sink();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].image, Bytes::from_static(b"<zero><one><two>"));
    assert_eq!(done.stats().duplicate_chunks, 1);
    Ok(())
}

/// A frame missing a chunk is evicted after the threshold; its late chunk
/// does not resurrect it.
#[tokio::test]
async fn test_incomplete_frame_is_evicted() -> Result<()> {
    let harness = start(test_config(), PassthroughDecoder)?;
    let socket = raw_sender().await?;

    socket.send_to(&encode_chunk(b"a", 0, 3), harness.addr).await?;
    socket.send_to(&encode_chunk(b"b", 1, 3), harness.addr).await?;
    harness.settle().await;

    harness.clock.advance(Duration::from_secs(3));
    harness.settle().await;

    socket.send_to(&encode_chunk(b"c", 2, 3), harness.addr).await?;

    let done = harness.finish().await?;
    assert!(done.sink().is_empty());
    assert_eq!(done.stats().frames_evicted, 1);
    // The late chunk opened a new, still incomplete entry.
    assert_eq!(done.table().len(), 1);
    Ok(())
}

/// A corrupt payload fails decoding without stopping the receiver.
#[tokio::test]
async fn test_decode_failure_does_not_stop_receiver() -> Result<()> {
    let harness = start(test_config(), JpegDecoder)?;
    let socket = raw_sender().await?;

    socket
        .send_to(&encode_chunk(b"not a jpeg at all", 0, 1), harness.addr)
        .await?;
    harness.settle().await;

    let sender = FrameSender::bind(&harness.sender_config(60_000)).await?;
    sender.send_frame(&jpeg_frame(8, 8)?).await?;

    let done = harness.finish().await?;
    assert_eq!(done.stats().decode_failures, 1);
    assert_eq!(done.sink().len(), 1);
    Ok(())
}
