//! Demultiplexer: the single read loop over the physical channel.
//!
//! Owns the frame classifier and fans every complete frame out into the
//! matching per-protocol TTL queue. Unclassifiable bytes are surfaced on a
//! typed anomaly channel instead of an error callback, so callers decide
//! what (if anything) to do with them.
//!
//! Any I/O error or EOF on the channel terminates the loop, closes all
//! three queues (blocked readers wake with `ChannelClosed`), and cancels
//! the hub token. The channel is never reopened here — reconnect policy
//! belongs to an external supervisor that rebuilds the whole pair.

use crate::framing::{FrameClassifier, Junk, ParseEvent, Protocol};
use crate::queue::TtlSender;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Receiving end of the anomaly channel. Bounded; if nobody drains it,
/// further anomalies are counted and dropped rather than stalling the
/// read loop.
pub type AnomalyReceiver = mpsc::Receiver<Junk>;

/// Per-protocol queue senders owned by the read loop.
pub(crate) struct DemuxSenders {
    pub nmea: TtlSender,
    pub ubx: TtlSender,
    pub rtcm: TtlSender,
}

impl DemuxSenders {
    fn route(&self, protocol: Protocol, bytes: bytes::Bytes) {
        match protocol {
            Protocol::Nmea => self.nmea.put(bytes),
            Protocol::Ubx => self.ubx.put(bytes),
            Protocol::Rtcm3 => self.rtcm.put(bytes),
        }
    }

    fn close_all(&self) {
        self.nmea.close();
        self.ubx.close();
        self.rtcm.close();
    }
}

/// Spawns the read loop and returns the anomaly receiver.
pub(crate) fn spawn_reader<R>(
    mut reader: R,
    senders: DemuxSenders,
    max_line_len: usize,
    anomaly_capacity: usize,
    token: CancellationToken,
) -> AnomalyReceiver
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (anomaly_tx, anomaly_rx) = mpsc::channel(anomaly_capacity);

    tokio::spawn(async move {
        let mut classifier = FrameClassifier::new(max_line_len);
        let mut buf = [0u8; 4096];
        let mut dropped_anomalies: u64 = 0;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                read_res = reader.read(&mut buf) => {
                    match read_res {
                        Ok(0) => {
                            info!("physical channel EOF");
                            break;
                        }
                        Ok(n) => {
                            classifier.push(&buf[..n]);
                            while let Some(event) = classifier.next_event() {
                                match event {
                                    ParseEvent::Frame(frame) => {
                                        trace!(protocol = %frame.protocol, len = frame.bytes.len(), "frame");
                                        senders.route(frame.protocol, frame.bytes);
                                    }
                                    ParseEvent::Junk(junk) => {
                                        if anomaly_tx.try_send(junk).is_err() {
                                            dropped_anomalies += 1;
                                            if dropped_anomalies == 1 || dropped_anomalies % 256 == 0 {
                                                warn!(dropped_anomalies, "anomaly channel full, dropping");
                                            }
                                        }
                                    }
                                }
                            }
                        }
                        Err(e) => {
                            error!("physical channel read error: {}", e);
                            break;
                        }
                    }
                }
            }
        }

        senders.close_all();
        token.cancel();
        debug!("demux read loop stopped");
    });

    anomaly_rx
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::MuxError;
    use crate::queue::ttl_queue;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    fn spawn_test_reader<R>(
        reader: R,
        token: CancellationToken,
    ) -> (
        crate::queue::TtlReceiver,
        crate::queue::TtlReceiver,
        crate::queue::TtlReceiver,
        AnomalyReceiver,
    )
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let ttl = Duration::from_secs(1);
        let (nmea_tx, nmea_rx) = ttl_queue(ttl);
        let (ubx_tx, ubx_rx) = ttl_queue(ttl);
        let (rtcm_tx, rtcm_rx) = ttl_queue(ttl);
        let anomalies = spawn_reader(
            reader,
            DemuxSenders {
                nmea: nmea_tx,
                ubx: ubx_tx,
                rtcm: rtcm_tx,
            },
            1024,
            16,
            token,
        );
        (nmea_rx, ubx_rx, rtcm_rx, anomalies)
    }

    #[tokio::test]
    async fn test_frames_fan_out_to_matching_queues() {
        let (mut port, channel) = tokio::io::duplex(1024);
        let token = CancellationToken::new();
        let (mut nmea, mut ubx, mut rtcm, _anomalies) =
            spawn_test_reader(channel, token.clone());

        port.write_all(b"$GPGGA,fix*1F\r\n").await.unwrap();
        port.write_all(&[0xB5, 0x62, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00])
            .await
            .unwrap();
        port.write_all(&[0xD3, 0x00, 0x02, 1, 2, 0, 0, 0]).await.unwrap();

        let get = Duration::from_millis(500);
        assert_eq!(nmea.get(get).await.unwrap(), &b"$GPGGA,fix*1F\r\n"[..]);
        assert_eq!(
            ubx.get(get).await.unwrap(),
            &[0xB5, 0x62, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00][..]
        );
        assert_eq!(rtcm.get(get).await.unwrap().len(), 8);

        token.cancel();
    }

    #[tokio::test]
    async fn test_junk_bytes_surface_as_anomalies() {
        let (mut port, channel) = tokio::io::duplex(1024);
        let token = CancellationToken::new();
        let (_nmea, _ubx, _rtcm, mut anomalies) = spawn_test_reader(channel, token.clone());

        port.write_all(&[0xFF, 0x00]).await.unwrap();
        port.write_all(b"$GPGSV,ok*00\n").await.unwrap();

        let junk = tokio::time::timeout(Duration::from_secs(1), anomalies.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&junk.bytes[..], &[0xFF, 0x00]);

        token.cancel();
    }

    #[tokio::test]
    async fn test_eof_closes_all_queues() {
        let (port, channel) = tokio::io::duplex(64);
        let token = CancellationToken::new();
        let (mut nmea, mut ubx, mut rtcm, _anomalies) =
            spawn_test_reader(channel, token.clone());

        drop(port); // EOF on the physical channel

        let get = Duration::from_secs(2);
        assert!(matches!(nmea.get(get).await, Err(MuxError::ChannelClosed)));
        assert!(matches!(ubx.get(get).await, Err(MuxError::ChannelClosed)));
        assert!(matches!(rtcm.get(get).await, Err(MuxError::ChannelClosed)));
        assert!(token.is_cancelled(), "reader failure must cancel the hub token");
    }
}
