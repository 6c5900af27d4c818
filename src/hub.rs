//! Stream hub: constructs the demux/mux pair over one physical channel and
//! hands out the per-protocol logical streams.
//!
//! One hub per physical channel, built once at stream-split time. There are
//! no process-wide singletons: the hub owns the split channel halves through
//! its spawned loops, and everything a consumer needs is returned from
//! [`StreamHub::split`]. When the channel dies (or [`HubHandle::shutdown`]
//! is called) all queues close, blocked readers wake with `ChannelClosed`,
//! and the owner is expected to reopen the device and build a fresh hub —
//! reconnect policy is deliberately not in here.

use crate::config::StreamConfig;
use crate::demux::{spawn_reader, AnomalyReceiver, DemuxSenders};
use crate::error::{MuxError, Result};
use crate::framing::Protocol;
use crate::mux::spawn_writer;
use crate::queue::ttl_queue;
use crate::stream::LogicalStream;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::SerialPortBuilderExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cloneable liveness/termination handle for one demux/mux pair.
#[derive(Clone)]
pub struct HubHandle {
    token: CancellationToken,
}

impl HubHandle {
    /// False once the pair has terminated (I/O failure, EOF or shutdown).
    pub fn is_alive(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Signals both loops to stop. Queues close, blocked readers wake with
    /// `ChannelClosed`, pending outbound units are dropped.
    pub fn shutdown(&self) {
        self.token.cancel();
    }
}

/// The split result: three independent logical streams over one wire.
pub struct StreamHub {
    pub nmea: LogicalStream,
    pub ubx: LogicalStream,
    pub rtcm: LogicalStream,
    /// Typed framing anomalies (unclassifiable bytes). Draining is optional.
    pub anomalies: AnomalyReceiver,
    handle: HubHandle,
}

impl StreamHub {
    /// Splits a duplex byte channel into the three protocol streams.
    ///
    /// Spawns the reader loop, the writer loop and one pruner task per
    /// queue; must be called within a tokio runtime.
    pub fn split<C>(channel: C, config: &StreamConfig) -> Self
    where
        C: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(channel);
        let token = CancellationToken::new();

        let (nmea_tx, nmea_rx) = ttl_queue(config.ttl());
        let (ubx_tx, ubx_rx) = ttl_queue(config.ttl());
        let (rtcm_tx, rtcm_rx) = ttl_queue(config.ttl());

        let anomalies = spawn_reader(
            read_half,
            DemuxSenders {
                nmea: nmea_tx,
                ubx: ubx_tx,
                rtcm: rtcm_tx,
            },
            config.max_line_len,
            config.anomaly_capacity,
            token.clone(),
        );

        let mux = spawn_writer(write_half, token.clone());

        let read_timeout = config.read_timeout();
        let max_line_len = config.max_line_len;
        let stream = |protocol, rx| {
            LogicalStream::new(protocol, rx, mux.clone(), read_timeout, max_line_len)
        };

        Self {
            nmea: stream(Protocol::Nmea, nmea_rx),
            ubx: stream(Protocol::Ubx, ubx_rx),
            rtcm: stream(Protocol::Rtcm3, rtcm_rx),
            anomalies,
            handle: HubHandle { token },
        }
    }

    /// Opens a serial device and splits it.
    ///
    /// Exclusive access is released on Unix so external tools can still
    /// observe the port, matching common GNSS tooling expectations.
    pub async fn open_serial(device: &str, baud: u32, config: &StreamConfig) -> Result<Self> {
        #[allow(unused_mut)]
        let mut port = tokio_serial::new(device, baud)
            .open_native_async()
            .map_err(|e| MuxError::serial(device, e))?;

        #[cfg(unix)]
        if let Err(e) = port.set_exclusive(false) {
            warn!("Failed to set exclusive mode on {}: {}", device, e);
        }

        info!("Serial stream hub opened on {} at {} baud", device, baud);
        Ok(Self::split(port, config))
    }

    /// Liveness/termination handle for this pair.
    pub fn handle(&self) -> HubHandle {
        self.handle.clone()
    }
}
