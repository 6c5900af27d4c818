//! Per-protocol logical stream facade.
//!
//! A [`LogicalStream`] is what protocol consumers hold: reads come from the
//! demultiplexer's TTL queue for that protocol, writes go through the shared
//! write multiplexer. Frames arrive from the queue as whole chunks; a small
//! carry-over buffer lets `read(n)` hand out arbitrary byte counts across
//! chunk boundaries. Expiry stays per-frame — once a chunk has been pulled
//! from the queue it is considered consumed.

use crate::error::{MuxError, Result};
use crate::framing::Protocol;
use crate::mux::MuxHandle;
use crate::queue::TtlReceiver;
use bytes::{Bytes, BytesMut};
use std::time::Duration;

pub struct LogicalStream {
    protocol: Protocol,
    rx: TtlReceiver,
    tx: MuxHandle,
    /// Unread remainder of the last queue chunk
    carry: BytesMut,
    read_timeout: Duration,
    max_line_len: usize,
}

impl LogicalStream {
    pub(crate) fn new(
        protocol: Protocol,
        rx: TtlReceiver,
        tx: MuxHandle,
        read_timeout: Duration,
        max_line_len: usize,
    ) -> Self {
        Self {
            protocol,
            rx,
            tx,
            carry: BytesMut::new(),
            read_timeout,
            max_line_len,
        }
    }

    /// Which protocol this stream carries.
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Reads exactly `n` bytes. There is no short read: quiet timeouts on
    /// the underlying queue are treated as "try again", so this blocks
    /// until `n` bytes arrive or the channel closes.
    pub async fn read(&mut self, n: usize) -> Result<Bytes> {
        let mut out = BytesMut::with_capacity(n);
        while out.len() < n {
            if !self.carry.is_empty() {
                let take = self.carry.len().min(n - out.len());
                out.extend_from_slice(&self.carry.split_to(take));
                continue;
            }
            let chunk = self.rx.get(self.read_timeout).await?;
            self.carry.extend_from_slice(&chunk);
        }
        Ok(out.freeze())
    }

    /// Returns whatever is buffered or the next fresh frame chunk; empty if
    /// nothing arrives within the read timeout. The forwarder-style read:
    /// take what is there, never block longer than one timeout.
    pub async fn read_chunk(&mut self) -> Result<Bytes> {
        if !self.carry.is_empty() {
            let len = self.carry.len();
            return Ok(self.carry.split_to(len).freeze());
        }
        self.rx.get(self.read_timeout).await
    }

    /// Non-blocking variant of [`read_chunk`](Self::read_chunk): returns
    /// only what is already buffered or queued, empty otherwise.
    pub async fn try_read_chunk(&mut self) -> Result<Bytes> {
        if !self.carry.is_empty() {
            let len = self.carry.len();
            return Ok(self.carry.split_to(len).freeze());
        }
        self.rx.get(Duration::ZERO).await
    }

    /// Reads through the next `\n`, inclusive.
    ///
    /// Fails with [`MuxError::LineTooLong`] once the accumulated line
    /// exceeds the configured bound without a terminator; the partial line
    /// is discarded so the next call starts clean.
    pub async fn read_line(&mut self) -> Result<Bytes> {
        let mut out = BytesMut::new();
        loop {
            if let Some(pos) = self.carry.iter().position(|&b| b == b'\n') {
                out.extend_from_slice(&self.carry.split_to(pos + 1));
                return Ok(out.freeze());
            }

            out.extend_from_slice(&self.carry.split_to(self.carry.len()));
            if out.len() > self.max_line_len {
                return Err(MuxError::LineTooLong {
                    limit: self.max_line_len,
                });
            }

            let chunk = self.rx.get(self.read_timeout).await?;
            self.carry.extend_from_slice(&chunk);
        }
    }

    /// Submits one whole frame to the write multiplexer. Returns once
    /// enqueued, not once physically transmitted.
    pub fn write(&self, data: &[u8]) -> Result<()> {
        self.tx.write(data)
    }

    /// Zero-copy variant of [`write`](Self::write).
    pub fn write_bytes(&self, data: Bytes) -> Result<()> {
        self.tx.write_bytes(data)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mux::spawn_writer;
    use crate::queue::ttl_queue;
    use tokio::io::AsyncReadExt;
    use tokio_util::sync::CancellationToken;

    fn test_stream(ttl: Duration) -> (crate::queue::TtlSender, LogicalStream, tokio::io::DuplexStream) {
        let (q_tx, q_rx) = ttl_queue(ttl);
        let (wire_tx, wire_rx) = tokio::io::duplex(1024);
        let mux = spawn_writer(wire_tx, CancellationToken::new());
        let stream = LogicalStream::new(
            Protocol::Nmea,
            q_rx,
            mux,
            Duration::from_millis(100),
            1024,
        );
        (q_tx, stream, wire_rx)
    }

    #[tokio::test]
    async fn test_read_slices_across_chunks() {
        let (q_tx, mut stream, _wire) = test_stream(Duration::from_secs(1));
        q_tx.put(Bytes::from_static(b"abcd"));
        q_tx.put(Bytes::from_static(b"efgh"));

        assert_eq!(stream.read(2).await.unwrap(), "ab");
        assert_eq!(stream.read(4).await.unwrap(), "cdef");
        assert_eq!(stream.read(2).await.unwrap(), "gh");
    }

    #[tokio::test]
    async fn test_read_line_across_chunks() {
        let (q_tx, mut stream, _wire) = test_stream(Duration::from_secs(1));
        q_tx.put(Bytes::from_static(b"$GPGGA,"));
        q_tx.put(Bytes::from_static(b"123*00\r\n$GPVTG"));

        assert_eq!(stream.read_line().await.unwrap(), "$GPGGA,123*00\r\n");
        // Remainder stays buffered for the next read
        assert_eq!(stream.read(6).await.unwrap(), "$GPVTG");
    }

    #[tokio::test]
    async fn test_read_line_bound() {
        let (q_tx, mut stream, _wire) = {
            let (q_tx, q_rx) = ttl_queue(Duration::from_secs(1));
            let (wire_tx, wire_rx) = tokio::io::duplex(64);
            let mux = spawn_writer(wire_tx, CancellationToken::new());
            let stream =
                LogicalStream::new(Protocol::Nmea, q_rx, mux, Duration::from_millis(100), 8);
            (q_tx, stream, wire_rx)
        };

        q_tx.put(Bytes::from_static(b"0123456789ABCDEF"));
        assert!(matches!(
            stream.read_line().await,
            Err(MuxError::LineTooLong { limit: 8 })
        ));
    }

    #[tokio::test]
    async fn test_write_reaches_wire() {
        let (_q_tx, stream, mut wire) = test_stream(Duration::from_secs(1));
        stream.write(b"$GPGGA,out*00\r\n").unwrap();

        let mut buf = vec![0u8; 15];
        wire.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf[..], b"$GPGGA,out*00\r\n");
    }

    #[tokio::test]
    async fn test_read_propagates_close() {
        let (q_tx, mut stream, _wire) = test_stream(Duration::from_secs(1));
        q_tx.close();
        assert!(matches!(
            stream.read(1).await,
            Err(MuxError::ChannelClosed)
        ));
    }
}
