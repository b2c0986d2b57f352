use anyhow::Result;

use camstream_core::wire::{encode_chunk, MAGIC};
use camstream_services::PassthroughDecoder;

use crate::*;

/// Every class of malformed datagram is counted and none reaches the table.
#[tokio::test]
async fn test_malformed_datagrams_are_rejected() -> Result<()> {
    let harness = start(test_config(), PassthroughDecoder)?;
    let socket = raw_sender().await?;

    // Too small for a header
    socket.send_to(b"CAM\x01\x02", harness.addr).await?;

    // Wrong marker
    let mut wrong_marker = encode_chunk(b"payload", 0, 2).to_vec();
    wrong_marker[..3].copy_from_slice(b"MAC");
    socket.send_to(&wrong_marker, harness.addr).await?;

    // Declared length larger than what arrived
    let mut header = Vec::new();
    header.extend_from_slice(&MAGIC);
    header.extend_from_slice(&1_000u32.to_le_bytes());
    header.extend_from_slice(&[0, 2]);
    header.extend_from_slice(b"short");
    socket.send_to(&header, harness.addr).await?;

    // Zero chunks, and an absurd chunk count
    socket.send_to(&encode_chunk(b"z", 0, 0), harness.addr).await?;
    socket.send_to(&encode_chunk(b"z", 0, 250), harness.addr).await?;

    // Index past the declared total
    socket.send_to(&encode_chunk(b"i", 5, 2), harness.addr).await?;

    let done = harness.finish().await?;
    let stats = done.stats();
    assert_eq!(stats.datagrams, 6);
    assert_eq!(stats.too_small, 1);
    assert_eq!(stats.invalid_magic, 1);
    assert_eq!(stats.truncated, 1);
    assert_eq!(stats.zero_chunks, 1);
    assert_eq!(stats.too_many_chunks, 1);
    assert_eq!(stats.unrecognized_index, 1);
    assert!(done.table().is_empty());
    assert!(done.sink().is_empty());
    Ok(())
}

/// Padding after the declared payload is ignored.
#[tokio::test]
async fn test_padding_after_payload_is_ignored() -> Result<()> {
    let harness = start(test_config(), PassthroughDecoder)?;
    let socket = raw_sender().await?;

    let mut padded = encode_chunk(b"frame", 0, 1).to_vec();
    padded.extend_from_slice(&[0u8; 32]);
    socket.send_to(&padded, harness.addr).await?;

    let done = harness.finish().await?;
    assert_eq!(done.sink().len(), 1);
    assert_eq!(&done.sink()[0].image[..], b"frame");
    Ok(())
}
