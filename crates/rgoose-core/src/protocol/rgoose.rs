//! R-GOOSE SPDU walker (IEC 61850-90-5 session layer over CLTP/UDP).
//!
//! Wire layout, all integers big-endian:
//! ```text
//! session header   spdu_id u8 | session_hdr_len u8 | common_session_id u8 | hdr_len u8
//!                  spdu_len u32 | spdu_num u32 | version u16
//! security info    curr_key_t u32 | next_key_t u16 | key_id u32 | iv_len u8 | iv[iv_len]
//! payload          payload_len u32 | apdu* (tag u8 | sim u8 | appid u16 | len u16 | pdu)
//! padding?         0xAF | len u8 | filler[len]
//! mac?             remaining bytes
//! ```
//!
//! Rules:
//! - The header length fields are displayed, not trusted: the session header
//!   and security info advance by their fixed widths (plus the IV).
//! - The APDU loop is bounded by the payload length and advanced by the
//!   declared APDU lengths; the byte cursor follows the PDU decoder.
//! - A read past the captured bytes yields one `MalformedLength` marker and
//!   stops the walk with the decoded prefix intact.
//! - A PDU decoder that makes no progress yields one `ZeroLengthPdu` marker
//!   and stops the walk.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::protocol::pdu::PduDecoder;
use crate::protocol::reader::{Reader, Truncated};
use crate::protocol::record::{ApduEntry, Dissection, Field, MarkerKind, Value};

pub const PROTOCOL: &str = "R-GOOSE";

pub const SPDU_TUNNELED: u8 = 0xA0;
pub const SPDU_GOOSE: u8 = 0xA1;
pub const SPDU_SV: u8 = 0xA2;
pub const SPDU_MNGT: u8 = 0xA3;

pub const PDU_GOOSE: u8 = 0x81;
pub const PDU_SV: u8 = 0x82;
pub const PDU_TUNNELED: u8 = 0x83;
pub const PDU_MNGT: u8 = 0x84;

/// tag, simulation, appid, length.
pub const APDU_HEADER_SIZE: usize = 6;
pub const PADDING_TAG: u8 = 0xAF;

/// Session header, security info (without IV), and payload length.
pub const FIXED_PREFIX_SIZE: usize = 14 + 11 + 4;

pub fn spdu_id_name(id: u8) -> Option<&'static str> {
    match id {
        SPDU_TUNNELED => Some("Tunneled"),
        SPDU_GOOSE => Some("GOOSE"),
        SPDU_SV => Some("Sample value"),
        SPDU_MNGT => Some("Management"),
        _ => None,
    }
}

pub fn pdu_tag_name(tag: u8) -> Option<&'static str> {
    match tag {
        PDU_GOOSE => Some("GOOSE"),
        PDU_SV => Some("SV"),
        PDU_TUNNELED => Some("Tunnel"),
        PDU_MNGT => Some("MNGT"),
        _ => None,
    }
}

/// What to do when declared lengths disagree with what was decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthChecks {
    /// Ignore disagreements.
    #[default]
    Tolerant,
    /// Add `LengthMismatch` warnings. Cursor advances are unchanged.
    Warn,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WalkOptions {
    pub length_checks: LengthChecks,
}

impl WalkOptions {
    pub(crate) fn warn(&self) -> bool {
        self.length_checks == LengthChecks::Warn
    }
}

enum Flow {
    Continue,
    Halt,
}

/// Walk one R-GOOSE SPDU starting at `start`.
///
/// Never reads past `buf.len()`. The result always holds the records decoded
/// before any failure.
pub fn walk(buf: &[u8], start: usize, decoder: &dyn PduDecoder, opts: &WalkOptions) -> Dissection {
    let mut out = Dissection::new(PROTOCOL);
    let mut rd = Reader::new(buf, start);

    if let Err(t) = walk_spdu(&mut rd, decoder, opts, &mut out) {
        debug!(offset = t.offset, needed = t.needed, available = t.available, "R-GOOSE walk truncated");
        out.mark_truncated(t);
    }

    out.cursor = rd.pos();
    out.close_all(rd.pos());
    out
}

fn walk_spdu(
    rd: &mut Reader<'_>,
    decoder: &dyn PduDecoder,
    opts: &WalkOptions,
    out: &mut Dissection,
) -> Result<(), Truncated> {
    let header = out.open(Field::SessionHeader, 0, rd.pos());
    out.read_u8(rd, Field::SpduId, 1)?;
    out.read_u8(rd, Field::SessionHdrLen, 1)?;
    out.read_u8(rd, Field::CommonSessionId, 1)?;
    out.read_u8(rd, Field::HdrLen, 1)?;
    out.read_u32(rd, Field::SpduLen, 1)?;
    out.read_u32(rd, Field::SpduNum, 1)?;
    out.read_u16(rd, Field::Version, 1)?;

    let security = out.open(Field::SecurityInfo, 1, rd.pos());
    out.read_u32(rd, Field::CurrentKeyTime, 2)?;
    out.read_u16(rd, Field::NextKeyTime, 2)?;
    out.read_u32(rd, Field::KeyId, 2)?;
    let iv_len = out.read_u8(rd, Field::InitVecLen, 2)?;
    if iv_len > 0 {
        out.read_bytes(rd, Field::InitVec, 2, usize::from(iv_len))?;
    }
    out.close(security, rd.pos());
    out.close(header, rd.pos());

    let user_info = out.open(Field::SessionUserInfo, 0, rd.pos());
    let payload = out.open(Field::Payload, 1, rd.pos());
    let payload_len = out.read_u32(rd, Field::PayloadLen, 2)?;

    let flow = walk_apdus(rd, payload_len, decoder, opts, out)?;
    out.close(payload, rd.pos());
    if let Flow::Halt = flow {
        return Ok(());
    }

    walk_trailer(rd, out)?;
    out.close(user_info, rd.captured_len());
    Ok(())
}

fn walk_apdus(
    rd: &mut Reader<'_>,
    payload_len: u32,
    decoder: &dyn PduDecoder,
    opts: &WalkOptions,
    out: &mut Dissection,
) -> Result<Flow, Truncated> {
    let payload_len = u64::from(payload_len);
    let mut apdu_cursor: u64 = 0;

    while apdu_cursor < payload_len {
        let at = rd.pos();
        let tag = out.read_u8(rd, Field::PduTag, 2)?;
        let simulation = out.read_u8(rd, Field::ApduSimulation, 2)?;
        let appid = out.read_u16(rd, Field::ApduAppid, 2)?;
        let declared_len = out.read_u16(rd, Field::ApduLen, 2)?;

        if tag != PDU_GOOSE {
            debug!(offset = at, tag, "non-GOOSE payload type, ending APDU walk");
            return Ok(Flow::Continue);
        }

        apdu_cursor += (APDU_HEADER_SIZE + usize::from(declared_len)) as u64;

        let pdu_at = rd.pos();
        let next = decoder.decode_pdu(rd.buffer(), pdu_at, 2, out);
        if next <= pdu_at {
            out.mark(MarkerKind::ZeroLengthPdu, pdu_at, "Internal error, zero-byte GOOSE PDU");
            debug!(offset = pdu_at, "GOOSE PDU decoder made no progress");
            return Ok(Flow::Halt);
        }
        rd.seek(next)?;

        let consumed = next - pdu_at;
        out.apdus.push(ApduEntry {
            offset: at,
            tag,
            simulation,
            appid,
            declared_len,
            consumed,
        });

        if opts.warn() && consumed != usize::from(declared_len) {
            out.mark(
                MarkerKind::LengthMismatch,
                pdu_at,
                format!("APDU length {declared_len} but PDU occupies {consumed} bytes"),
            );
        }
    }

    if opts.warn() && apdu_cursor > payload_len {
        out.mark(
            MarkerKind::LengthMismatch,
            rd.pos(),
            format!("APDU lengths sum to {apdu_cursor}, payload length is {payload_len}"),
        );
    }

    Ok(Flow::Continue)
}

fn walk_trailer(rd: &mut Reader<'_>, out: &mut Dissection) -> Result<(), Truncated> {
    if rd.remaining() >= 2 && rd.peek_u8() == Some(PADDING_TAG) {
        let padding = out.open(Field::Padding, 1, rd.pos());
        let at = rd.pos();
        rd.u8()?;
        out.push(Field::PaddingTag, 2, at, 1, Value::None);
        let len = out.read_u8(rd, Field::PaddingLen, 2)?;
        if len > 0 {
            out.read_bytes(rd, Field::PaddingBytes, 2, usize::from(len))?;
        }
        out.close(padding, rd.pos());
    }

    if rd.remaining() > 0 {
        out.read_bytes(rd, Field::Hmac, 1, rd.remaining())?;
    }
    Ok(())
}
