//! Frame sending: packetize and transmit. Mirrors the streamer's behavior so
//! receivers can be exercised without it.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::net::UdpSocket;

use camstream_core::config::SenderConfig;
use camstream_core::split_frame;

pub struct FrameSender {
    socket: UdpSocket,
    target: SocketAddr,
    max_packet_size: usize,
    max_total_chunks: u8,
}

impl FrameSender {
    pub async fn bind(config: &SenderConfig) -> Result<Self> {
        let local: SocketAddr = if config.target_addr.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(local)
            .await
            .context("failed to bind sender socket")?;
        Ok(Self {
            socket,
            target: config.target_addr,
            max_packet_size: config.max_packet_size,
            max_total_chunks: u8::MAX,
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Send one encoded frame. Returns the number of datagrams emitted.
    pub async fn send_frame(&self, frame: &[u8]) -> Result<usize> {
        let packets = split_frame(frame, self.max_packet_size, self.max_total_chunks)
            .context("failed to packetize frame")?;

        for packet in &packets {
            self.socket
                .send_to(packet, self.target)
                .await
                .context("failed to send datagram")?;
        }

        tracing::debug!(
            to = %self.target,
            bytes = frame.len(),
            datagrams = packets.len(),
            "frame sent"
        );

        Ok(packets.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camstream_core::parse_datagram;

    #[tokio::test]
    async fn large_frame_arrives_as_indexed_chunks() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = SenderConfig {
            target_addr: receiver.local_addr().unwrap(),
            max_packet_size: 1000,
        };
        let sender = FrameSender::bind(&config).await.unwrap();
        assert_eq!(sender.target(), receiver.local_addr().unwrap());

        let frame = vec![0x5a; 2500];
        assert_eq!(sender.send_frame(&frame).await.unwrap(), 3);

        let mut buf = vec![0u8; 2048];
        let mut total = 0;
        for expected_index in 0..3u8 {
            let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
            let chunk = parse_datagram(&bytes::Bytes::copy_from_slice(&buf[..len]), 64).unwrap();
            assert_eq!(chunk.chunk_index, expected_index);
            assert_eq!(chunk.total_chunks, 3);
            total += chunk.data.len();
        }
        assert_eq!(total, 2500);
    }
}
