//! Synchronous configuration transport over the UBX logical stream.
//!
//! Implements the set/poll keyed-parameter protocol: encode a CFG-VALSET or
//! CFG-VALGET message, write it, and block for the matching acknowledgment
//! before returning. At most one transaction is ever in flight — concurrent
//! callers serialize on a mutex held across the entire write-then-await-ack
//! sequence, so two requests can never interleave on the wire and an
//! acknowledgment can never be attributed to the wrong caller.

use crate::error::{MuxError, Result};
use crate::framing::Protocol;
use crate::stream::LogicalStream;
use crate::ubx::keys::{storage_size_from_id, CfgKey};
use crate::ubx::value::CfgValue;
use crate::ubx::{
    UbxFrame, CLASS_ACK, CLASS_CFG, ID_ACK_ACK, ID_ACK_NAK, ID_CFG_VALGET, ID_CFG_VALSET,
};
use bytes::{BufMut, BytesMut};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Maximum key/value pairs per CFG-VALSET message
const MAX_SET_ITEMS: usize = 64;

/// Memory layers a configuration write targets (bitmask on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryLayer {
    Ram,
    Bbr,
    Flash,
}

impl MemoryLayer {
    fn bits(&self) -> u8 {
        match self {
            MemoryLayer::Ram => 1,
            MemoryLayer::Bbr => 2,
            MemoryLayer::Flash => 4,
        }
    }
}

/// Memory layers a poll reads from. Distinct coding from [`MemoryLayer`]:
/// polls address one layer by ordinal, not by bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollLayer {
    Ram,
    Bbr,
    Flash,
    Default,
}

impl PollLayer {
    fn code(&self) -> u8 {
        match self {
            PollLayer::Ram => 0,
            PollLayer::Bbr => 1,
            PollLayer::Flash => 2,
            PollLayer::Default => 7,
        }
    }
}

/// One decoded entry of a CFG-VALGET response.
#[derive(Debug, Clone)]
pub struct KeyValue {
    pub id: u32,
    /// Database entry, if the key is known
    pub key: Option<&'static CfgKey>,
    pub value: CfgValue,
}

/// The request/acknowledgment configuration client.
///
/// Cheap to clone; all clones share the same transaction lock and the same
/// underlying UBX stream.
#[derive(Clone)]
pub struct CfgTransport {
    stream: Arc<Mutex<LogicalStream>>,
}

impl CfgTransport {
    /// Wraps the UBX logical stream. The stream must be the UBX half of a
    /// [`StreamHub`](crate::hub::StreamHub) split.
    pub fn new(ubx: LogicalStream) -> Self {
        debug_assert_eq!(ubx.protocol(), Protocol::Ubx);
        Self {
            stream: Arc::new(Mutex::new(ubx)),
        }
    }

    /// Writes the given key/value pairs to `layer` and awaits the positive
    /// acknowledgment.
    ///
    /// Fails with [`MuxError::UnexpectedFrame`] on ACK-NAK or any other
    /// frame, [`MuxError::Timeout`] when nothing arrives in `timeout`, and
    /// [`MuxError::ChannelClosed`] if the hub died. After any outcome the
    /// transport is immediately usable for the next call.
    pub async fn set_keys(
        &self,
        layer: MemoryLayer,
        transaction: u8,
        items: &[(&CfgKey, CfgValue)],
        timeout: Duration,
    ) -> Result<()> {
        let request = encode_valset(layer, transaction, items)?;

        let mut stream = self.stream.lock().await;
        let deadline = Instant::now() + timeout;

        drain_stale_frames(&mut stream).await?;
        debug!(items = items.len(), ?layer, "CFG-VALSET");
        stream.write_bytes(request.to_bytes())?;

        let ack = read_frame(&mut stream, deadline).await?;
        expect_ack(&ack, ID_CFG_VALSET)
    }

    /// Polls the given keys from `layer` and returns the decoded key/value
    /// mapping.
    ///
    /// The receiver answers with the configuration-value frame followed by
    /// the acknowledgment, in exactly that order; a response without a
    /// trailing ACK-ACK is a protocol violation and fails the call.
    pub async fn poll_keys(
        &self,
        layer: PollLayer,
        position: u16,
        keys: &[&CfgKey],
        timeout: Duration,
    ) -> Result<Vec<KeyValue>> {
        let request = encode_valget(layer, position, keys);

        let mut stream = self.stream.lock().await;
        let deadline = Instant::now() + timeout;

        drain_stale_frames(&mut stream).await?;
        debug!(keys = keys.len(), ?layer, "CFG-VALGET");
        stream.write_bytes(request.to_bytes())?;

        let response = read_frame(&mut stream, deadline).await?;
        if (response.class, response.id) != (CLASS_CFG, ID_CFG_VALGET) {
            return Err(MuxError::unexpected_frame(
                "CFG-VALGET response",
                response.identity(),
            ));
        }
        let values = decode_valget_response(&response)?;

        let ack = read_frame(&mut stream, deadline).await?;
        expect_ack(&ack, ID_CFG_VALGET)?;

        Ok(values)
    }
}

fn encode_valset(
    layer: MemoryLayer,
    transaction: u8,
    items: &[(&CfgKey, CfgValue)],
) -> Result<UbxFrame> {
    if items.is_empty() || items.len() > MAX_SET_ITEMS {
        return Err(MuxError::config(format!(
            "CFG-VALSET takes 1..={} items, got {}",
            MAX_SET_ITEMS,
            items.len()
        )));
    }

    let mut payload = BytesMut::new();
    // version 1 carries a transaction id, version 0 does not
    payload.put_u8(if transaction > 0 { 1 } else { 0 });
    payload.put_u8(layer.bits());
    payload.put_u8(transaction);
    payload.put_u8(0); // reserved

    for (key, value) in items {
        if value.kind() != key.kind {
            return Err(MuxError::config(format!(
                "key {} expects {:?}, got {:?}",
                key.name,
                key.kind,
                value.kind()
            )));
        }
        payload.put_u32_le(key.id);
        value.encode(&mut payload);
    }

    Ok(UbxFrame::new(CLASS_CFG, ID_CFG_VALSET, payload.freeze()))
}

fn encode_valget(layer: PollLayer, position: u16, keys: &[&CfgKey]) -> UbxFrame {
    let mut payload = BytesMut::new();
    payload.put_u8(0); // request version
    payload.put_u8(layer.code());
    payload.put_u16_le(position);
    for key in keys {
        payload.put_u32_le(key.id);
    }
    UbxFrame::new(CLASS_CFG, ID_CFG_VALGET, payload.freeze())
}

fn decode_valget_response(frame: &UbxFrame) -> Result<Vec<KeyValue>> {
    let payload = &frame.payload;
    if payload.len() < 4 {
        return Err(MuxError::unexpected_frame(
            "CFG-VALGET response",
            format!("{}-byte payload", payload.len()),
        ));
    }

    let mut rest = &payload[4..]; // version, layer, position consumed
    let mut out = Vec::new();
    while !rest.is_empty() {
        if rest.len() < 4 {
            return Err(MuxError::unexpected_frame(
                "CFG-VALGET response",
                "truncated key id".to_string(),
            ));
        }
        let id = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]);
        rest = &rest[4..];

        let key = crate::ubx::keys::lookup_id(id);
        let size = key
            .map(|k| k.kind.wire_size())
            .unwrap_or_else(|| storage_size_from_id(id));
        if size == 0 || rest.len() < size {
            return Err(MuxError::unexpected_frame(
                "CFG-VALGET response",
                format!("undecodable value for key {:#010X}", id),
            ));
        }

        let kind = key.map(|k| k.kind).unwrap_or_else(|| match size {
            1 => crate::ubx::keys::ValueKind::U1,
            2 => crate::ubx::keys::ValueKind::U2,
            8 => crate::ubx::keys::ValueKind::U8,
            _ => crate::ubx::keys::ValueKind::U4,
        });
        let value = CfgValue::decode(kind, &rest[..size])?;
        rest = &rest[size..];

        out.push(KeyValue { id, key, value });
    }

    Ok(out)
}

fn expect_ack(frame: &UbxFrame, for_id: u8) -> Result<()> {
    match (frame.class, frame.id) {
        (CLASS_ACK, ID_ACK_ACK)
            if frame.payload.len() == 2 && frame.payload[..] == [CLASS_CFG, for_id] =>
        {
            Ok(())
        }
        (CLASS_ACK, ID_ACK_NAK) => Err(MuxError::unexpected_frame("ACK-ACK", "ACK-NAK")),
        _ => Err(MuxError::unexpected_frame("ACK-ACK", frame.identity())),
    }
}

/// Reads one whole UBX frame off the stream, bounded by `deadline`.
async fn read_frame(stream: &mut LogicalStream, deadline: Instant) -> Result<UbxFrame> {
    let read = async {
        let header = stream.read(6).await?;
        let payload_len = u16::from_le_bytes([header[4], header[5]]) as usize;
        let rest = stream.read(payload_len + 2).await?;

        let mut raw = BytesMut::with_capacity(header.len() + rest.len());
        raw.extend_from_slice(&header);
        raw.extend_from_slice(&rest);
        UbxFrame::parse(&raw)
    };

    match tokio::time::timeout_at(deadline, read).await {
        Ok(frame) => frame,
        Err(_) => Err(MuxError::Timeout),
    }
}

/// Discards UBX frames already queued before a new transaction starts —
/// leftovers of a timed-out transaction or unsolicited receiver output
/// would otherwise be mistaken for this transaction's acknowledgment.
async fn drain_stale_frames(stream: &mut LogicalStream) -> Result<()> {
    loop {
        let chunk = stream.try_read_chunk().await?;
        if chunk.is_empty() {
            return Ok(());
        }
        trace!(len = chunk.len(), "discarding stale UBX bytes");
    }
}
