//! camstreamd: receives a chunked camera stream and reassembles frames.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use camstream_core::config::CamstreamConfig;
use camstream_services::{
    bind_socket, reassembly_loop, receive_loop, Datagram, JpegDecoder, LatestFrameSink,
    Reassembler, SystemClock, TransportCounters,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = CamstreamConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = CamstreamConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        CamstreamConfig::default()
    });
    let receiver = config.receiver;

    tracing::info!(
        bind = %receiver.bind_addr,
        poll_interval_ms = receiver.poll_interval_ms,
        stale_after_ms = receiver.stale_after_ms,
        max_total_chunks = receiver.max_total_chunks,
        "camstreamd starting"
    );

    let socket = Arc::new(
        bind_socket(receiver.bind_addr, receiver.recv_buffer_bytes)
            .context("failed to bind frame socket")?,
    );

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let counters = Arc::new(TransportCounters::default());
    let (queue_tx, queue_rx) = mpsc::channel::<Datagram>(receiver.queue_depth.max(1));
    let (sink, mut frames) = LatestFrameSink::channel();

    let receive_task = tokio::spawn(receive_loop(
        socket,
        queue_tx,
        counters.clone(),
        shutdown_tx.subscribe(),
    ));

    let reassembly_task = tokio::spawn(reassembly_loop(
        Reassembler::new(&receiver, SystemClock, JpegDecoder, sink),
        queue_rx,
        counters,
        receiver.poll_interval(),
        receiver.stats_interval(),
    ));

    // Stand-in consumer: reports each frame it gets to see.
    let viewer_task = tokio::spawn(async move {
        while frames.changed().await.is_ok() {
            let Some(frame) = frames.borrow_and_update().clone() else {
                continue;
            };
            let (width, height) = frame.image.dimensions();
            tracing::info!(
                key = frame.key,
                chunks = frame.total_chunks,
                bytes = frame.encoded_len,
                width,
                height,
                "frame"
            );
        }
    });

    // ── Wait for exit ────────────────────────────────────────────────────────

    match receive_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "receive loop failed"),
        Err(e) => tracing::error!(error = %e, "receive task panicked"),
    }

    // The receive loop dropped its queue sender; the reassembler drains and stops.
    // Dropping the returned reassembler closes the frame channel, which ends
    // the viewer.
    reassembly_task.await.context("reassembly task panicked")?;
    viewer_task.await.ok();

    tracing::info!("camstreamd stopped");
    Ok(())
}
