//! camstream integration test harness.
//!
//! Each test runs a full receiver (socket task + reassembly task) on a
//! loopback port and feeds it real UDP datagrams, either through
//! `FrameSender` or hand-built with the wire encoder.
//!
//!   cargo test --test integration

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use camstream_core::config::{ReceiverConfig, SenderConfig};
use camstream_services::{
    bind_socket, reassembly_loop, receive_loop, DeliveredFrame, FrameDecoder, ManualClock,
    Reassembler, TransportCounters,
};

mod delivery;
mod malformed;

// ── Harness ───────────────────────────────────────────────────────────────────

pub type Collected<D> =
    Reassembler<ManualClock, D, Vec<DeliveredFrame<<D as FrameDecoder>::Image>>>;

/// A running receiver bound to 127.0.0.1 on an OS-assigned port.
///
/// Frame keys come from `clock`, so tests decide when a second boundary is
/// crossed.
pub struct Harness<D: FrameDecoder> {
    pub addr: SocketAddr,
    pub clock: ManualClock,
    shutdown: broadcast::Sender<()>,
    receive: JoinHandle<Result<()>>,
    reassembly: JoinHandle<Collected<D>>,
}

/// Receiver settings tuned for tests: fast polling, loopback bind.
pub fn test_config() -> ReceiverConfig {
    ReceiverConfig {
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        poll_interval_ms: 20,
        stats_interval_secs: 0,
        ..ReceiverConfig::default()
    }
}

pub fn start<D>(config: ReceiverConfig, decoder: D) -> Result<Harness<D>>
where
    D: FrameDecoder + Send + 'static,
    D::Image: Send + 'static,
{
    let socket = Arc::new(bind_socket(config.bind_addr, config.recv_buffer_bytes)?);
    let addr = socket.local_addr()?;
    let counters = Arc::new(TransportCounters::default());
    let (queue_tx, queue_rx) = mpsc::channel(config.queue_depth);
    let (shutdown, _) = broadcast::channel(1);

    let receive = tokio::spawn(receive_loop(
        socket,
        queue_tx,
        counters.clone(),
        shutdown.subscribe(),
    ));

    let clock = ManualClock::new(1_000);
    let reassembly = tokio::spawn(reassembly_loop(
        Reassembler::new(&config, clock.clone(), decoder, Vec::new()),
        queue_rx,
        counters,
        config.poll_interval(),
        None,
    ));

    Ok(Harness {
        addr,
        clock,
        shutdown,
        receive,
        reassembly,
    })
}

impl<D: FrameDecoder> Harness<D> {
    pub fn sender_config(&self, max_packet_size: usize) -> SenderConfig {
        SenderConfig {
            target_addr: self.addr,
            max_packet_size,
        }
    }

    /// Give the receiver time to pick up what was just sent.
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    /// Let in-flight datagrams land, then shut down and hand back the
    /// reassembler for inspection.
    pub async fn finish(self) -> Result<Collected<D>> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        self.shutdown.send(()).ok();
        self.receive.await.context("receive task panicked")??;
        self.reassembly.await.context("reassembly task panicked")
    }
}

/// An unconnected socket for sending raw datagrams.
pub async fn raw_sender() -> Result<UdpSocket> {
    Ok(UdpSocket::bind("127.0.0.1:0").await?)
}
