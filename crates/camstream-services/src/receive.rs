//! Receive path: socket task and reassembly task.
//!
//! The socket task only reads datagrams and hands them over a bounded
//! channel. The reassembly task owns the `Reassembler` outright, so the
//! frame table is never touched from two tasks. Shutdown stops the socket
//! task; dropping its sender lets the reassembly task drain the queue and
//! return.

use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use camstream_core::wire::MAX_DATAGRAM;

use crate::clock::Clock;
use crate::codec::FrameDecoder;
use crate::reassembler::Reassembler;
use crate::sink::FrameSink;
use crate::stats::bump;

/// One datagram as read from the socket.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub payload: Bytes,
    pub from: SocketAddr,
}

/// Counters written by the socket task, read by the reassembly task.
#[derive(Debug, Default)]
pub struct TransportCounters {
    pub errors: AtomicU64,
    pub overflows: AtomicU64,
}

/// Bind a UDP socket for the receiver, with SO_REUSEADDR and an enlarged
/// kernel receive buffer. `recv_buffer_bytes == 0` keeps the OS default.
pub fn bind_socket(addr: SocketAddr, recv_buffer_bytes: usize) -> Result<UdpSocket> {
    let domain = if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP)).context("socket()")?;

    socket.set_reuse_address(true).context("SO_REUSEADDR")?;
    if recv_buffer_bytes > 0 {
        if let Err(e) = socket.set_recv_buffer_size(recv_buffer_bytes) {
            tracing::warn!(error = %e, requested = recv_buffer_bytes, "could not enlarge receive buffer");
        }
    }
    socket.set_nonblocking(true).context("set_nonblocking")?;
    socket
        .bind(&addr.into())
        .with_context(|| format!("bind({addr})"))?;

    UdpSocket::from_std(socket.into()).context("failed to convert to tokio UdpSocket")
}

/// Read datagrams until shutdown and queue them for reassembly.
///
/// A full queue drops the datagram rather than stalling the socket. A
/// failed read is logged and the loop carries on.
pub async fn receive_loop(
    socket: Arc<UdpSocket>,
    queue: mpsc::Sender<Datagram>,
    counters: Arc<TransportCounters>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let mut buf = vec![0u8; MAX_DATAGRAM];

    tracing::info!(addr = %socket.local_addr()?, "frame receiver listening");

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("receive loop shutting down");
                return Ok(());
            }

            result = socket.recv_from(&mut buf) => {
                let received = result.map(|(len, from)| Datagram {
                    payload: Bytes::copy_from_slice(&buf[..len]),
                    from,
                });
                if !forward(&queue, &counters, received) {
                    tracing::info!("reassembly queue closed, receive loop exiting");
                    return Ok(());
                }
            }
        }
    }
}

/// Queue one read result for reassembly. Read errors and a full queue are
/// counted and dropped. Returns `false` only once the queue is closed.
fn forward(
    queue: &mpsc::Sender<Datagram>,
    counters: &TransportCounters,
    received: std::io::Result<Datagram>,
) -> bool {
    let datagram = match received {
        Ok(d) => d,
        Err(e) => {
            let errors = bump(&counters.errors);
            tracing::warn!(error = %e, errors, "recv_from failed");
            return true;
        }
    };

    match queue.try_send(datagram) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(d)) => {
            let overflows = bump(&counters.overflows);
            tracing::debug!(from = %d.from, overflows, "reassembly queue full, datagram dropped");
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

/// Drive the reassembler: wait up to `poll_interval` for a datagram, process
/// it, then deliver and reap. Deliver/reap run every cycle, traffic or not.
///
/// Returns the reassembler once the queue is closed and drained.
pub async fn reassembly_loop<C, D, S>(
    mut reassembler: Reassembler<C, D, S>,
    mut queue: mpsc::Receiver<Datagram>,
    counters: Arc<TransportCounters>,
    poll_interval: Duration,
    stats_interval: Option<Duration>,
) -> Reassembler<C, D, S>
where
    C: Clock,
    D: FrameDecoder,
    S: FrameSink<D::Image>,
{
    let mut last_stats = Instant::now();
    let mut last_logged = None;

    loop {
        match tokio::time::timeout(poll_interval, queue.recv()).await {
            Ok(Some(datagram)) => {
                tracing::trace!(from = %datagram.from, len = datagram.payload.len(), "datagram");
                reassembler.handle_datagram(datagram.payload);
            }
            Ok(None) => {
                reassembler.tick();
                reassembler.stats_mut().merge_transport(&counters);
                tracing::info!("datagram queue closed, reassembly loop exiting");
                reassembler.stats().log();
                return reassembler;
            }
            Err(_) => {}
        }

        reassembler.tick();

        if let Some(every) = stats_interval {
            if last_stats.elapsed() >= every {
                last_stats = Instant::now();
                reassembler.stats_mut().merge_transport(&counters);
                // Only log when something changed since the last line.
                if last_logged.as_ref() != Some(reassembler.stats()) {
                    reassembler.stats().log();
                    last_logged = Some(reassembler.stats().clone());
                }
            }
        }
    }
}
