//! Packet exchange over any byte stream
//!
//! Each call runs one full acknowledgement cycle. A call that fails part way
//! leaves the peer mid-protocol, so callers must not retry on their own.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use vsp_core::{VspError, VspResult};
use vsp_wire::{encode_packet, parse_response, Decoded, PacketDecoder, ACK, NAK};

use crate::TransportConfig;

/// Out-of-band byte that interrupts a free-running simulation
pub const SIGNAL_INTERRUPT: u8 = 0x03;

/// Framed, acknowledged packet channel
#[derive(Debug)]
pub struct PacketChannel<S> {
    io: BufStream<S>,
    config: TransportConfig,
}

impl<S> PacketChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(io: S, config: TransportConfig) -> Self {
        PacketChannel {
            io: BufStream::new(io),
            config,
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    async fn read_byte(&mut self) -> VspResult<u8> {
        match timeout(self.config.read_timeout, self.io.read_u8()).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(VspError::Timeout),
        }
    }

    async fn write_all(&mut self, bytes: &[u8]) -> VspResult<()> {
        self.io.write_all(bytes).await?;
        self.io.flush().await?;
        Ok(())
    }

    /// Send one frame and wait for `+`, retransmitting on anything else
    pub async fn send(&mut self, payload: &str) -> VspResult<()> {
        let frame = encode_packet(payload.as_bytes());

        for attempt in 1..=self.config.retries {
            self.write_all(&frame).await?;
            let ack = self.read_byte().await?;
            if ack == ACK {
                trace!(payload, attempt, "packet acknowledged");
                return Ok(());
            }
            warn!(payload, attempt, ack, "packet not acknowledged, retrying");
        }

        Err(VspError::SendFailed {
            payload: payload.to_string(),
        })
    }

    /// Send one frame without waiting for an acknowledgement
    pub async fn post(&mut self, payload: &str) -> VspResult<()> {
        let frame = encode_packet(payload.as_bytes());
        self.write_all(&frame).await
    }

    /// Send a single unframed byte
    pub async fn signal(&mut self, byte: u8) -> VspResult<()> {
        debug!(byte, "sending signal");
        self.write_all(&[byte]).await
    }

    /// Receive one frame, NAKing corrupt ones until the retry budget is spent
    pub async fn receive(&mut self) -> VspResult<Bytes> {
        let mut decoder = PacketDecoder::with_limit(self.config.max_payload);
        let mut budget = self.config.retries;

        loop {
            let byte = self.read_byte().await?;
            match decoder.feed(byte)? {
                Decoded::Pending => {}
                Decoded::Packet(payload) => {
                    self.write_all(&[ACK]).await?;
                    return Ok(payload);
                }
                Decoded::Corrupt { expected, actual } => {
                    budget = budget.saturating_sub(1);
                    if budget == 0 {
                        warn!(?expected, actual, "checksum mismatch, giving up");
                        return Err(VspError::ReceiveFailed);
                    }
                    warn!(?expected, actual, budget, "checksum mismatch, requesting retransmit");
                    self.write_all(&[NAK]).await?;
                }
            }
        }
    }

    /// Receive one frame and split it into response fields
    pub async fn receive_fields(&mut self) -> VspResult<Vec<String>> {
        let payload = self.receive().await?;
        let raw = std::str::from_utf8(&payload)
            .map_err(|_| VspError::Malformed("response is not valid UTF-8".into()))?;
        parse_response(raw)
    }

    /// One request/response round trip
    pub async fn command(&mut self, cmd: &str) -> VspResult<Vec<String>> {
        debug!(cmd, "command");
        self.send(cmd).await?;
        self.receive_fields().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{duplex, DuplexStream};

    fn channel(config: TransportConfig) -> (PacketChannel<DuplexStream>, DuplexStream) {
        let (client, server) = duplex(64 * 1024);
        (PacketChannel::new(client, config), server)
    }

    async fn drain(server: &mut DuplexStream) -> Vec<u8> {
        let mut out = Vec::new();
        server.read_to_end(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn test_send_acknowledged() {
        let (mut chan, mut server) = channel(TransportConfig::default());
        server.write_all(b"+").await.unwrap();

        chan.send("status").await.unwrap();
        drop(chan);

        assert_eq!(drain(&mut server).await, b"$status#a4");
    }

    #[tokio::test]
    async fn test_send_retransmits_after_nak() {
        let (mut chan, mut server) = channel(TransportConfig::default());
        server.write_all(b"-+").await.unwrap();

        chan.send("stop").await.unwrap();
        drop(chan);

        let frame = encode_packet(b"stop");
        let mut expected = frame.to_vec();
        expected.extend_from_slice(&frame);
        assert_eq!(drain(&mut server).await, expected);
    }

    #[tokio::test]
    async fn test_send_retry_exhaustion() {
        let (mut chan, mut server) = channel(TransportConfig::default());
        server.write_all(b"-----").await.unwrap();

        let err = chan.send("version").await.unwrap_err();
        assert_eq!(
            err,
            VspError::SendFailed {
                payload: "version".into()
            }
        );
        drop(chan);

        let frame = encode_packet(b"version");
        assert_eq!(drain(&mut server).await.len(), frame.len() * 5);
    }

    #[tokio::test]
    async fn test_receive_acks_valid_frame() {
        let (mut chan, mut server) = channel(TransportConfig::default());
        server.write_all(&encode_packet(b"OK,1")).await.unwrap();

        let payload = chan.receive().await.unwrap();
        assert_eq!(&payload[..], b"OK,1");
        drop(chan);

        assert_eq!(drain(&mut server).await, b"+");
    }

    #[tokio::test]
    async fn test_receive_recovers_from_one_corrupt_frame() {
        let (mut chan, mut server) = channel(TransportConfig::default());
        server.write_all(b"$OK#00").await.unwrap();
        server.write_all(&encode_packet(b"OK")).await.unwrap();

        let payload = chan.receive().await.unwrap();
        assert_eq!(&payload[..], b"OK");
        drop(chan);

        assert_eq!(drain(&mut server).await, b"-+");
    }

    #[tokio::test]
    async fn test_receive_retry_exhaustion_sends_four_naks() {
        let (mut chan, mut server) = channel(TransportConfig::default());
        for _ in 0..5 {
            server.write_all(b"$OK,garbled#00").await.unwrap();
        }
        // A valid frame after the budget must never be consumed
        server.write_all(&encode_packet(b"OK")).await.unwrap();

        let err = chan.receive().await.unwrap_err();
        assert_eq!(err, VspError::ReceiveFailed);
        drop(chan);

        assert_eq!(drain(&mut server).await, b"----");
    }

    #[tokio::test]
    async fn test_receive_overflow() {
        let config = TransportConfig::default().with_max_payload(8);
        let (mut chan, mut server) = channel(config);
        server
            .write_all(&encode_packet(b"OK,0123456789"))
            .await
            .unwrap();

        let err = chan.receive().await.unwrap_err();
        assert_eq!(err, VspError::Overflow { limit: 8 });
    }

    #[tokio::test]
    async fn test_receive_escaped_payload() {
        let (mut chan, mut server) = channel(TransportConfig::default());
        server
            .write_all(&encode_packet(b"OK,cost$5#tag*}"))
            .await
            .unwrap();

        let fields = chan.receive_fields().await.unwrap();
        assert_eq!(fields, vec!["cost$5#tag*}"]);
    }

    #[tokio::test]
    async fn test_command_peer_error() {
        let (mut chan, mut server) = channel(TransportConfig::default());
        server.write_all(b"+").await.unwrap();
        server
            .write_all(&encode_packet(b"ERROR,unknown command"))
            .await
            .unwrap();

        let err = chan.command("bogus").await.unwrap_err();
        assert_eq!(err, VspError::Peer("unknown command".into()));
    }

    #[tokio::test]
    async fn test_signal_is_single_unframed_byte() {
        let (mut chan, mut server) = channel(TransportConfig::default());
        chan.signal(SIGNAL_INTERRUPT).await.unwrap();
        drop(chan);

        assert_eq!(drain(&mut server).await, vec![SIGNAL_INTERRUPT]);
    }

    #[tokio::test]
    async fn test_post_does_not_wait_for_ack() {
        let (mut chan, mut server) = channel(TransportConfig::default());
        chan.post("quit").await.unwrap();
        drop(chan);

        assert_eq!(drain(&mut server).await, encode_packet(b"quit").to_vec());
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let config = TransportConfig::default().with_read_timeout(Duration::from_millis(20));
        let (mut chan, _server) = channel(config);

        let err = chan.receive().await.unwrap_err();
        assert_eq!(err, VspError::Timeout);
    }

    #[tokio::test]
    async fn test_peer_closed() {
        let (mut chan, server) = channel(TransportConfig::default());
        drop(server);

        let err = chan.receive().await.unwrap_err();
        assert_eq!(err, VspError::NotConnected);
    }
}
