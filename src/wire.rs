//! Control message framing and fixed-layout modem records.
//!
//! The transaction layer correlates requests and responses through a small
//! control header; indication and response payloads carry the one-byte-field
//! records defined here. This framing is internal to the control plane — it
//! is not a vendor wire protocol.
//!
//! Parsing is lenient in the same way everywhere: `parse` returns `None` on
//! short or malformed input and the caller decides whether that is worth a
//! log line.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{DecodeError, Result};

// ============================================================================
// SERVICE AND MESSAGE IDENTIFIERS
// ============================================================================

/// RIL control service.
pub const SERVICE_RIL: u8 = 0x0F;
/// Network access service.
pub const SERVICE_NAS: u8 = 0x10;
/// Messaging service.
pub const SERVICE_WMS: u8 = 0x11;
/// Phonebook service.
pub const SERVICE_PBM: u8 = 0x12;

/// Query the current signal strength (NAS).
pub const MSG_GET_SIGNAL_STRENGTH: u16 = 0x20;
/// Query registration/attach state (NAS).
pub const MSG_GET_SYSTEM_INFO: u16 = 0x21;
/// Unsolicited network status indication (NAS).
pub const MSG_NETWORK_STATUS: u16 = 0x22;
/// Query SIM card status (RIL).
pub const MSG_GET_CARD_STATUS: u16 = 0x23;
/// Query SIM slot status (RIL).
pub const MSG_GET_SLOT_STATUS: u16 = 0x24;
/// Unsolicited "modem finished booting" pulse (RIL).
///
/// The firmware tags the ready pulse with the RIL service number in the
/// message field, so the two values coincide.
pub const MSG_MODEM_READY: u16 = 0x0F;

// ============================================================================
// CONTROL FRAME
// ============================================================================

/// Frame kinds on a control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    Request = 0x00,
    Response = 0x01,
    Indication = 0x02,
}

impl FrameKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Request),
            0x01 => Some(Self::Response),
            0x02 => Some(Self::Indication),
            _ => None,
        }
    }
}

/// Control frame header (8 bytes).
///
/// `txn_id` correlates a [`Response`](FrameKind::Response) with the request
/// that produced it; it is 0 for indications, which answer nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    /// Frame kind
    pub kind: FrameKind,
    /// Service the message belongs to
    pub service: u8,
    /// Message ID within the service
    pub message: u16,
    /// Correlation identifier (0 for indications)
    pub txn_id: u16,
    /// Payload length in bytes
    pub length: u16,
}

impl FrameHeader {
    pub const SIZE: usize = 8;

    /// Parse a header from bytes.
    pub fn parse(buf: &mut impl Buf) -> Option<Self> {
        if buf.remaining() < Self::SIZE {
            return None;
        }

        let kind = FrameKind::from_u8(buf.get_u8())?;
        let service = buf.get_u8();
        let message = buf.get_u16();
        let txn_id = buf.get_u16();
        let length = buf.get_u16();

        Some(Self {
            kind,
            service,
            message,
            txn_id,
            length,
        })
    }

    /// Serialize the header to bytes.
    pub fn serialize(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.kind as u8);
        buf.put_u8(self.service);
        buf.put_u16(self.message);
        buf.put_u16(self.txn_id);
        buf.put_u16(self.length);
    }
}

/// A complete control frame (header + payload).
#[derive(Debug, Clone)]
pub struct Frame {
    pub header: FrameHeader,
    pub payload: Bytes,
}

impl Frame {
    /// Build a request frame.
    pub fn request(service: u8, message: u16, txn_id: u16, payload: &[u8]) -> Self {
        Self {
            header: FrameHeader {
                kind: FrameKind::Request,
                service,
                message,
                txn_id,
                length: payload.len() as u16,
            },
            payload: Bytes::copy_from_slice(payload),
        }
    }

    /// Parse a frame from bytes. The payload must be complete.
    pub fn parse(buf: &mut impl Buf) -> Option<Self> {
        let header = FrameHeader::parse(buf)?;
        let payload_len = header.length as usize;

        if buf.remaining() < payload_len {
            return None;
        }

        let payload = buf.copy_to_bytes(payload_len);

        Some(Self { header, payload })
    }

    /// Serialize the frame to bytes.
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(FrameHeader::SIZE + self.payload.len());
        self.header.serialize(&mut buf);
        buf.extend_from_slice(&self.payload);
        buf.freeze()
    }
}

// ============================================================================
// FIXED-LAYOUT RECORDS
// ============================================================================

fn short_payload(what: &str, want: usize, got: usize) -> DecodeError {
    DecodeError::new(format!("{what}: need {want} bytes, got {got}"))
}

/// SIM card status record (4 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CardStatus {
    pub card_state: u8,
    pub upin_state: u8,
    pub upuk_retries: u8,
    pub upin_retries: u8,
}

impl CardStatus {
    pub const SIZE: usize = 4;

    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut buf = payload;
        if buf.remaining() < Self::SIZE {
            return Err(short_payload("card status", Self::SIZE, buf.remaining()).into());
        }
        Ok(Self {
            card_state: buf.get_u8(),
            upin_state: buf.get_u8(),
            upuk_retries: buf.get_u8(),
            upin_retries: buf.get_u8(),
        })
    }

    pub fn serialize(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.card_state);
        buf.put_u8(self.upin_state);
        buf.put_u8(self.upuk_retries);
        buf.put_u8(self.upin_retries);
    }
}

/// Signal strength sample (2 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SignalSample {
    pub strength: u8,
    pub radio_interface: u8,
}

impl SignalSample {
    pub const SIZE: usize = 2;

    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut buf = payload;
        if buf.remaining() < Self::SIZE {
            return Err(short_payload("signal sample", Self::SIZE, buf.remaining()).into());
        }
        Ok(Self {
            strength: buf.get_u8(),
            radio_interface: buf.get_u8(),
        })
    }

    pub fn serialize(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.strength);
        buf.put_u8(self.radio_interface);
    }
}

/// Registration and attach state record (5 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SystemInfo {
    pub registration_state: u8,
    pub cs_attach_state: u8,
    pub ps_attach_state: u8,
    pub network_type: u8,
    pub roaming_indicator: u8,
}

impl SystemInfo {
    pub const SIZE: usize = 5;

    /// A registration_state of 1 means "registered on the home network".
    pub fn is_registered(&self) -> bool {
        self.registration_state == 1
    }

    pub fn parse(payload: &[u8]) -> Result<Self> {
        let mut buf = payload;
        if buf.remaining() < Self::SIZE {
            return Err(short_payload("system info", Self::SIZE, buf.remaining()).into());
        }
        Ok(Self {
            registration_state: buf.get_u8(),
            cs_attach_state: buf.get_u8(),
            ps_attach_state: buf.get_u8(),
            network_type: buf.get_u8(),
            roaming_indicator: buf.get_u8(),
        })
    }

    pub fn serialize(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.registration_state);
        buf.put_u8(self.cs_attach_state);
        buf.put_u8(self.ps_attach_state);
        buf.put_u8(self.network_type);
        buf.put_u8(self.roaming_indicator);
    }
}
