//! GOOSE application PDU decoding (IEC 61850-8-1 GOOSEpdu, BER).
//!
//! The walkers only know the `PduDecoder` contract: given a frame and an
//! offset, advance past one encoded PDU or hand the offset back unchanged.
//! `BerGooseDecoder` is the stock implementation.

use tracing::debug;

use crate::protocol::ber::{self, Tlv};
use crate::protocol::record::{Dissection, Field, MarkerKind, Value};

/// `[APPLICATION 0]` gseMngtPdu.
pub const GSE_MNGT_PDU_TAG: u8 = 0x60;
/// `[APPLICATION 1]` goosePdu.
pub const GOOSE_PDU_TAG: u8 = 0x61;

/// Default nesting limit for array/structure Data.
pub const DEFAULT_MAX_DEPTH: u8 = 16;

/// Decodes one embedded application PDU.
pub trait PduDecoder {
    /// Decode the PDU at `offset`, writing records at `depth`.
    ///
    /// Returns the offset past the PDU, or `offset` itself when nothing could
    /// be decoded.
    fn decode_pdu(&self, buf: &[u8], offset: usize, depth: u8, out: &mut Dissection) -> usize;
}

/// BER GOOSEpdu decoder.
#[derive(Debug, Clone, Copy)]
pub struct BerGooseDecoder {
    max_depth: u8,
}

impl Default for BerGooseDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl BerGooseDecoder {
    pub fn new(max_depth: u8) -> Self {
        Self { max_depth }
    }

    fn goose_pdu(&self, pdu: &Tlv<'_>, depth: u8, out: &mut Dissection) {
        let mut next = pdu.value_offset;
        for child in pdu.children() {
            let tlv = match child {
                Ok(t) => t,
                Err(e) => {
                    debug!(error = %e, "goosePdu element unreadable");
                    let rest = value_from(pdu, next);
                    out.push(Field::Unknown, depth, next, rest.len(), Value::Bytes(rest.to_vec()));
                    return;
                }
            };
            next = tlv.end();

            match tlv.ident {
                0x80 => text(out, Field::GocbRef, &tlv, depth),
                0x81 => int(out, Field::TimeAllowedToLive, &tlv, depth),
                0x82 => text(out, Field::DatSet, &tlv, depth),
                0x83 => text(out, Field::GoId, &tlv, depth),
                0x84 => time(out, Field::T, &tlv, depth),
                0x85 => int(out, Field::StNum, &tlv, depth),
                0x86 => int(out, Field::SqNum, &tlv, depth),
                0x87 => boolean(out, Field::Simulation, &tlv, depth),
                0x88 => int(out, Field::ConfRev, &tlv, depth),
                0x89 => boolean(out, Field::NdsCom, &tlv, depth),
                0x8A => int(out, Field::NumDatSetEntries, &tlv, depth),
                0xAB => {
                    out.push(Field::AllData, depth, tlv.offset, tlv.total_len(), Value::None);
                    self.data_list(&tlv, depth.saturating_add(1), 0, out);
                }
                0x8C | 0xAC => opaque(out, Field::Security, &tlv, depth),
                _ => opaque(out, Field::Unknown, &tlv, depth),
            }
        }
    }

    fn data_list(&self, seq: &Tlv<'_>, depth: u8, level: u8, out: &mut Dissection) {
        for child in seq.children() {
            match child {
                Ok(tlv) => self.data(&tlv, depth, level, out),
                Err(e) => {
                    debug!(error = %e, "Data element unreadable");
                    return;
                }
            }
        }
    }

    fn data(&self, tlv: &Tlv<'_>, depth: u8, level: u8, out: &mut Dissection) {
        match tlv.ident {
            0xA1 | 0xA2 => {
                let field = if tlv.ident == 0xA1 { Field::Array } else { Field::Structure };
                if level >= self.max_depth {
                    debug!(offset = tlv.offset, "Data nesting limit reached");
                    opaque(out, field, tlv, depth);
                    return;
                }
                out.push(field, depth, tlv.offset, tlv.total_len(), Value::None);
                self.data_list(tlv, depth.saturating_add(1), level.saturating_add(1), out);
            }
            0x83 => boolean(out, Field::Boolean, tlv, depth),
            0x84 => opaque(out, Field::BitString, tlv, depth),
            0x85 => int(out, Field::Integer, tlv, depth),
            0x86 => {
                let value = ber::unsigned(tlv.value).map_or_else(|| Value::Bytes(tlv.value.to_vec()), Value::Uint);
                out.push(Field::Unsigned, depth, tlv.offset, tlv.total_len(), value);
            }
            0x87 => {
                let value = ber::floating_point(tlv.value)
                    .map_or_else(|| Value::Bytes(tlv.value.to_vec()), Value::Float);
                out.push(Field::FloatingPoint, depth, tlv.offset, tlv.total_len(), value);
            }
            0x89 => opaque(out, Field::OctetString, tlv, depth),
            0x8A => text(out, Field::VisibleString, tlv, depth),
            0x8C => opaque(out, Field::BinaryTime, tlv, depth),
            0x8D => int(out, Field::Bcd, tlv, depth),
            0x90 => text(out, Field::MmsString, tlv, depth),
            0x91 => time(out, Field::UtcTime, tlv, depth),
            _ => opaque(out, Field::Unknown, tlv, depth),
        }
    }
}

impl PduDecoder for BerGooseDecoder {
    fn decode_pdu(&self, buf: &[u8], offset: usize, depth: u8, out: &mut Dissection) -> usize {
        let pdu = match ber::read_tlv(buf, offset) {
            Ok(t) => t,
            Err(e) => {
                debug!(offset, error = %e, "no GOOSEpdu at offset");
                return offset;
            }
        };

        match pdu.ident {
            GOOSE_PDU_TAG => {
                out.push(Field::GoosePdu, depth, pdu.offset, pdu.total_len(), Value::None);
                self.goose_pdu(&pdu, depth.saturating_add(1), out);
                pdu.end()
            }
            GSE_MNGT_PDU_TAG => {
                opaque(out, Field::GseMngtPdu, &pdu, depth);
                pdu.end()
            }
            other => {
                debug!(offset, tag = other, "unexpected GOOSEpdu choice tag");
                offset
            }
        }
    }
}

/// Bytes of `tlv`'s value from absolute offset `from` to its end.
fn value_from<'a>(tlv: &Tlv<'a>, from: usize) -> &'a [u8] {
    tlv.value.get(from.saturating_sub(tlv.value_offset)..).unwrap_or_default()
}

fn opaque(out: &mut Dissection, field: Field, tlv: &Tlv<'_>, depth: u8) {
    out.push(field, depth, tlv.offset, tlv.total_len(), Value::Bytes(tlv.value.to_vec()));
}

fn text(out: &mut Dissection, field: Field, tlv: &Tlv<'_>, depth: u8) {
    out.push(field, depth, tlv.offset, tlv.total_len(), Value::Text(ber::text(tlv.value)));
}

fn int(out: &mut Dissection, field: Field, tlv: &Tlv<'_>, depth: u8) {
    let value = ber::integer(tlv.value).map_or_else(|| Value::Bytes(tlv.value.to_vec()), Value::Int);
    out.push(field, depth, tlv.offset, tlv.total_len(), value);
}

fn boolean(out: &mut Dissection, field: Field, tlv: &Tlv<'_>, depth: u8) {
    let value = ber::boolean(tlv.value).map_or_else(|| Value::Bytes(tlv.value.to_vec()), Value::Bool);
    out.push(field, depth, tlv.offset, tlv.total_len(), value);
}

fn time(out: &mut Dissection, field: Field, tlv: &Tlv<'_>, depth: u8) {
    match ber::utc_time(tlv.value) {
        Some(t) => {
            out.push(field, depth, tlv.offset, tlv.total_len(), Value::Time(t));
        }
        None => {
            out.mark(
                MarkerKind::MalformedUtcTime,
                tlv.offset,
                format!("BER Error: malformed UTCTime encoding, length must be 8 bytes, got {}", tlv.value.len()),
            );
            opaque(out, field, tlv, depth);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]

    use super::*;

    fn pdu(body: &[u8]) -> Vec<u8> {
        let mut v = vec![GOOSE_PDU_TAG, body.len() as u8];
        v.extend_from_slice(body);
        v
    }

    #[test]
    fn decodes_header_fields_and_data() {
        let body = [
            0x80, 0x03, b'c', b'b', b'1', // gocbRef
            0x81, 0x02, 0x07, 0xD0, // timeAllowedtoLive = 2000
            0x84, 0x08, 0x00, 0x00, 0x00, 0x0A, 0x80, 0x00, 0x00, 0x0A, // t
            0x85, 0x01, 0x05, // stNum
            0x87, 0x01, 0x00, // simulation
            0xAB, 0x06, 0x83, 0x01, 0x01, 0x86, 0x01, 0x2A, // allData
        ];
        let buf = pdu(&body);
        let mut out = Dissection::new("GOOSE");
        let end = BerGooseDecoder::default().decode_pdu(&buf, 0, 1, &mut out);

        assert_eq!(end, buf.len());
        assert_eq!(out.find(Field::GocbRef).unwrap().value, Value::Text("cb1".into()));
        assert_eq!(out.find(Field::TimeAllowedToLive).unwrap().value, Value::Int(2000));
        assert_eq!(out.find(Field::StNum).unwrap().value, Value::Int(5));
        assert_eq!(out.find(Field::Simulation).unwrap().value, Value::Bool(false));
        assert_eq!(out.find(Field::Boolean).unwrap().value, Value::Bool(true));
        assert_eq!(out.find(Field::Unsigned).unwrap().value, Value::Uint(42));
        assert_eq!(out.find(Field::Unsigned).unwrap().depth, 3);
        match &out.find(Field::T).unwrap().value {
            Value::Time(t) => {
                assert_eq!(t.seconds, 10);
                assert_eq!(t.nanos(), 500_000_000);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(out.markers.is_empty());
    }

    #[test]
    fn short_utc_time_warns_and_continues() {
        let body = [0x84, 0x04, 0x00, 0x00, 0x00, 0x01, 0x85, 0x01, 0x02];
        let buf = pdu(&body);
        let mut out = Dissection::new("GOOSE");
        let end = BerGooseDecoder::default().decode_pdu(&buf, 0, 1, &mut out);

        assert_eq!(end, buf.len());
        assert_eq!(out.markers_of(MarkerKind::MalformedUtcTime), 1);
        assert!(!out.has_errors());
        assert_eq!(out.find(Field::StNum).unwrap().value, Value::Int(2));
    }

    #[test]
    fn foreign_tag_makes_no_progress() {
        let buf = [0x30, 0x00];
        let mut out = Dissection::new("GOOSE");
        assert_eq!(BerGooseDecoder::default().decode_pdu(&buf, 0, 1, &mut out), 0);
        assert!(out.records.is_empty());
    }

    #[test]
    fn nesting_limit_turns_deep_data_opaque() {
        // allData { structure { structure { boolean } } }
        let body = [0xAB, 0x07, 0xA2, 0x05, 0xA2, 0x03, 0x83, 0x01, 0x01];
        let buf = pdu(&body);
        let mut out = Dissection::new("GOOSE");
        BerGooseDecoder::new(1).decode_pdu(&buf, 0, 0, &mut out);

        assert_eq!(out.count(Field::Structure), 2);
        assert_eq!(out.count(Field::Boolean), 0);
    }

    fn tlv(tag: u8, body: &[u8]) -> Vec<u8> {
        let mut v = vec![tag];
        match body.len() {
            n if n < 0x80 => v.push(n as u8),
            n if n <= 0xFF => v.extend_from_slice(&[0x81, n as u8]),
            n => {
                v.push(0x82);
                v.extend_from_slice(&(n as u16).to_be_bytes());
            }
        }
        v.extend_from_slice(body);
        v
    }

    #[test]
    fn deep_nesting_with_max_limit_saturates_depth() {
        let mut data = vec![0x83, 0x01, 0x01];
        for _ in 0..260 {
            data = tlv(0xA2, &data);
        }
        let buf = tlv(GOOSE_PDU_TAG, &tlv(0xAB, &data));
        let mut out = Dissection::new("R-GOOSE");
        let end = BerGooseDecoder::new(u8::MAX).decode_pdu(&buf, 0, 2, &mut out);

        assert_eq!(end, buf.len());
        // 255 levels recurse, the next one is kept opaque
        assert_eq!(out.count(Field::Structure), 256);
        assert_eq!(out.count(Field::Boolean), 0);
        assert_eq!(out.records.last().map(|r| r.depth), Some(u8::MAX));
    }
}
