//! Write multiplexer: serializes whole-frame writes from independent
//! producers onto the single physical channel.
//!
//! Producers enqueue complete units through a cloneable [`MuxHandle`]; one
//! dedicated writer task dequeues and writes each unit fully before the
//! next, so frames from different protocols are never interleaved on the
//! wire. Strict submission order, no priority between protocols.

use crate::error::{MuxError, Result};
use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Cloneable producer handle onto the outbound queue.
///
/// The queue is unbounded (the reference behavior for this splitter);
/// `write` returns once the unit is enqueued, not once it hits the wire.
#[derive(Clone)]
pub struct MuxHandle {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl MuxHandle {
    /// Enqueues one whole write unit.
    ///
    /// Fails with [`MuxError::ChannelClosed`] once the writer loop has
    /// terminated.
    pub fn write(&self, data: &[u8]) -> Result<()> {
        self.write_bytes(Bytes::copy_from_slice(data))
    }

    /// Zero-copy variant of [`write`](Self::write).
    pub fn write_bytes(&self, unit: Bytes) -> Result<()> {
        self.tx.send(unit).map_err(|_| MuxError::ChannelClosed)
    }
}

/// Spawns the writer task over the channel's write half and returns the
/// producer handle.
///
/// The loop exits on cancellation or write failure; a failure cancels
/// `token` so the owning hub (and its reader side) observe the dead pair.
pub(crate) fn spawn_writer<W>(writer: W, token: CancellationToken) -> MuxHandle
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        if let Err(e) = drain_loop(rx, writer, token.clone()).await {
            error!("write mux error: {}", e);
        }
        token.cancel();
        debug!("write mux loop stopped");
    });

    MuxHandle { tx }
}

async fn drain_loop<W>(
    mut rx: mpsc::UnboundedReceiver<Bytes>,
    writer: W,
    token: CancellationToken,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut writer = BufWriter::new(writer);

    loop {
        tokio::select! {
            _ = token.cancelled() => return Ok(()),
            unit = rx.recv() => {
                let Some(unit) = unit else { return Ok(()) };
                writer.write_all(&unit).await?;

                // Drain whatever queued up while we were writing, then flush
                // once the queue is empty to avoid per-unit syscalls.
                while let Ok(more) = rx.try_recv() {
                    writer.write_all(&more).await?;
                }
                writer.flush().await?;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_units_written_in_submission_order() {
        let (tx, mut rx) = tokio::io::duplex(256);
        let token = CancellationToken::new();
        let handle = spawn_writer(tx, token.clone());

        handle.write(b"$GPGGA,1*00\r\n").unwrap();
        handle.write(&[0xD3, 0x00, 0x01, 0xAA, 0, 0, 0]).unwrap();
        handle.write(b"$GPVTG,2*00\r\n").unwrap();

        let mut out = vec![0u8; 13 + 7 + 13];
        rx.read_exact(&mut out).await.unwrap();

        assert_eq!(&out[..13], b"$GPGGA,1*00\r\n");
        assert_eq!(&out[13..20], &[0xD3, 0x00, 0x01, 0xAA, 0, 0, 0]);
        assert_eq!(&out[20..], b"$GPVTG,2*00\r\n");

        token.cancel();
    }

    #[tokio::test]
    async fn test_write_fails_after_shutdown() {
        let (tx, _rx) = tokio::io::duplex(64);
        let token = CancellationToken::new();
        let handle = spawn_writer(tx, token.clone());

        token.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(matches!(
            handle.write(b"late"),
            Err(MuxError::ChannelClosed)
        ));
    }
}
