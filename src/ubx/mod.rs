//! UBX protocol primitives and the synchronous configuration transport.
//!
//! The demultiplexer delivers whole UBX frames on the UBX logical stream;
//! this module gives them structure: checksum, class/id identities, and the
//! request/acknowledgment configuration protocol (CFG-VALSET / CFG-VALGET)
//! layered on top.

pub mod keys;
pub mod receiver;
pub mod transport;
pub mod value;

use crate::error::{MuxError, Result};
use crate::framing::{UBX_SYNC1, UBX_SYNC2};
use bytes::{BufMut, Bytes, BytesMut};

/// Message classes used by the configuration protocol
pub const CLASS_ACK: u8 = 0x05;
pub const CLASS_CFG: u8 = 0x06;

/// Message IDs
pub const ID_ACK_NAK: u8 = 0x00;
pub const ID_ACK_ACK: u8 = 0x01;
pub const ID_CFG_VALSET: u8 = 0x8A;
pub const ID_CFG_VALGET: u8 = 0x8B;

/// Calculate the UBX Fletcher checksum over class, id, length and payload.
pub fn fletcher_checksum(data: &[u8]) -> (u8, u8) {
    let mut ck_a: u8 = 0;
    let mut ck_b: u8 = 0;

    for &byte in data {
        ck_a = ck_a.wrapping_add(byte);
        ck_b = ck_b.wrapping_add(ck_a);
    }

    (ck_a, ck_b)
}

/// One UBX message, separated from its wire framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UbxFrame {
    pub class: u8,
    pub id: u8,
    pub payload: Bytes,
}

impl UbxFrame {
    pub fn new(class: u8, id: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            class,
            id,
            payload: payload.into(),
        }
    }

    /// Human-readable identity string, pyubx2-style ("ACK-ACK", "CFG-VALSET").
    pub fn identity(&self) -> String {
        match (self.class, self.id) {
            (CLASS_ACK, ID_ACK_ACK) => "ACK-ACK".to_string(),
            (CLASS_ACK, ID_ACK_NAK) => "ACK-NAK".to_string(),
            (CLASS_CFG, ID_CFG_VALSET) => "CFG-VALSET".to_string(),
            (CLASS_CFG, ID_CFG_VALGET) => "CFG-VALGET".to_string(),
            (class, id) => format!("{:02X}-{:02X}", class, id),
        }
    }

    /// Serialize to a complete wire frame: sync, header, payload, checksum.
    pub fn to_bytes(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(8 + self.payload.len());
        out.put_u8(UBX_SYNC1);
        out.put_u8(UBX_SYNC2);
        out.put_u8(self.class);
        out.put_u8(self.id);
        out.put_u16_le(self.payload.len() as u16);
        out.put_slice(&self.payload);

        let (ck_a, ck_b) = fletcher_checksum(&out[2..]);
        out.put_u8(ck_a);
        out.put_u8(ck_b);
        out.freeze()
    }

    /// Parse and validate one complete wire frame.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.len() < 8 || raw[0] != UBX_SYNC1 || raw[1] != UBX_SYNC2 {
            return Err(MuxError::unexpected_frame(
                "UBX frame",
                format!("{} bytes without UBX sync", raw.len()),
            ));
        }

        let payload_len = u16::from_le_bytes([raw[4], raw[5]]) as usize;
        if raw.len() != 6 + payload_len + 2 {
            return Err(MuxError::unexpected_frame(
                "UBX frame",
                format!("length field {} vs {} frame bytes", payload_len, raw.len()),
            ));
        }

        let (ck_a, ck_b) = fletcher_checksum(&raw[2..6 + payload_len]);
        if (ck_a, ck_b) != (raw[6 + payload_len], raw[7 + payload_len]) {
            return Err(MuxError::unexpected_frame(
                "UBX frame",
                "checksum mismatch".to_string(),
            ));
        }

        Ok(Self {
            class: raw[2],
            id: raw[3],
            payload: Bytes::copy_from_slice(&raw[6..6 + payload_len]),
        })
    }
}
