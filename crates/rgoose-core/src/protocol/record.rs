//! Decode output: field records, markers, and the `Dissection` accumulator.
//!
//! The field table is a closed enum passed around by value. Walkers and PDU
//! decoders write into a caller-owned `Dissection`, so independent frames can
//! be decoded concurrently without any shared registration state.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::RgooseError;
use crate::protocol::reader::{Reader, Truncated};
use crate::protocol::rgoose::{pdu_tag_name, spdu_id_name};

/// Every field the walkers and the BER decoder can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    // R-GOOSE session layer
    SessionHeader,
    SpduId,
    SessionHdrLen,
    CommonSessionId,
    HdrLen,
    SpduLen,
    SpduNum,
    Version,
    SecurityInfo,
    CurrentKeyTime,
    NextKeyTime,
    KeyId,
    InitVecLen,
    InitVec,
    SessionUserInfo,
    Payload,
    PayloadLen,
    PduTag,
    ApduSimulation,
    ApduAppid,
    ApduLen,
    Padding,
    PaddingTag,
    PaddingLen,
    PaddingBytes,
    Hmac,

    // Layer 2 GOOSE header
    Goose,
    Appid,
    Length,
    Reserve1,
    Reserve2,

    // GOOSEpdu
    GoosePdu,
    GseMngtPdu,
    GocbRef,
    TimeAllowedToLive,
    DatSet,
    GoId,
    T,
    StNum,
    SqNum,
    Simulation,
    ConfRev,
    NdsCom,
    NumDatSetEntries,
    AllData,
    Security,

    // Data CHOICE
    Array,
    Structure,
    Boolean,
    BitString,
    Integer,
    Unsigned,
    FloatingPoint,
    OctetString,
    VisibleString,
    BinaryTime,
    Bcd,
    MmsString,
    UtcTime,
    Unknown,
}

impl Field {
    /// Filter-style name, e.g. `rgoose.spdu_id`.
    pub fn abbrev(self) -> &'static str {
        self.info().0
    }

    /// Human label, e.g. `Session identifier`.
    pub fn name(self) -> &'static str {
        self.info().1
    }

    /// Numeric values of this field read better as `0x.. (..)`.
    pub fn is_hex(self) -> bool {
        matches!(
            self,
            Field::SpduId
                | Field::CommonSessionId
                | Field::Version
                | Field::CurrentKeyTime
                | Field::NextKeyTime
                | Field::KeyId
                | Field::PduTag
                | Field::ApduSimulation
                | Field::ApduAppid
                | Field::ApduLen
                | Field::PaddingLen
                | Field::Appid
                | Field::Reserve1
                | Field::Reserve2
        )
    }

    fn info(self) -> (&'static str, &'static str) {
        match self {
            Field::SessionHeader => ("rgoose.session_hdr", "Session header"),
            Field::SpduId => ("rgoose.spdu_id", "Session identifier"),
            Field::SessionHdrLen => ("rgoose.session_hdr_len", "Session header length"),
            Field::CommonSessionId => ("rgoose.common_session_id", "Common session header identifier"),
            Field::HdrLen => ("rgoose.hdr_len", "Header length"),
            Field::SpduLen => ("rgoose.spdu_len", "SPDU length"),
            Field::SpduNum => ("rgoose.spdu_num", "SPDU number"),
            Field::Version => ("rgoose.version", "Version"),
            Field::SecurityInfo => ("rgoose.sec_info", "Security information"),
            Field::CurrentKeyTime => ("rgoose.curr_key_t", "Time of current key"),
            Field::NextKeyTime => ("rgoose.next_key_t", "Time of next key"),
            Field::KeyId => ("rgoose.key_id", "Key ID"),
            Field::InitVecLen => ("rgoose.init_v_len", "Initialization vector length"),
            Field::InitVec => ("rgoose.init_v", "Initialization vector"),
            Field::SessionUserInfo => ("rgoose.session_user_info", "Session user information"),
            Field::Payload => ("rgoose.payload", "Payload"),
            Field::PayloadLen => ("rgoose.payload_len", "Payload length"),
            Field::PduTag => ("rgoose.pdu_tag", "Payload type tag"),
            Field::ApduSimulation => ("rgoose.simulation", "Simulation flag"),
            Field::ApduAppid => ("rgoose.appid", "APPID"),
            Field::ApduLen => ("rgoose.apdu_len", "APDU length"),
            Field::Padding => ("rgoose.padding", "Padding"),
            Field::PaddingTag => ("rgoose.padding_tag", "Padding"),
            Field::PaddingLen => ("rgoose.padding_len", "Padding length"),
            Field::PaddingBytes => ("rgoose.padding_bytes", "Padding"),
            Field::Hmac => ("rgoose.hmac", "HMAC"),

            Field::Goose => ("goose", "GOOSE"),
            Field::Appid => ("goose.appid", "APPID"),
            Field::Length => ("goose.length", "Length"),
            Field::Reserve1 => ("goose.reserve1", "Reserved 1"),
            Field::Reserve2 => ("goose.reserve2", "Reserved 2"),

            Field::GoosePdu => ("goose.goosePdu_element", "goosePdu"),
            Field::GseMngtPdu => ("goose.gseMngtPdu_element", "gseMngtPdu"),
            Field::GocbRef => ("goose.gocbRef", "gocbRef"),
            Field::TimeAllowedToLive => ("goose.timeAllowedtoLive", "timeAllowedtoLive"),
            Field::DatSet => ("goose.datSet", "datSet"),
            Field::GoId => ("goose.goID", "goID"),
            Field::T => ("goose.t", "t"),
            Field::StNum => ("goose.stNum", "stNum"),
            Field::SqNum => ("goose.sqNum", "sqNum"),
            Field::Simulation => ("goose.simulation", "simulation"),
            Field::ConfRev => ("goose.confRev", "confRev"),
            Field::NdsCom => ("goose.ndsCom", "ndsCom"),
            Field::NumDatSetEntries => ("goose.numDatSetEntries", "numDatSetEntries"),
            Field::AllData => ("goose.allData", "allData"),
            Field::Security => ("goose.security", "security"),

            Field::Array => ("goose.array", "array"),
            Field::Structure => ("goose.structure", "structure"),
            Field::Boolean => ("goose.boolean", "boolean"),
            Field::BitString => ("goose.bit_string", "bit-string"),
            Field::Integer => ("goose.integer", "integer"),
            Field::Unsigned => ("goose.unsigned", "unsigned"),
            Field::FloatingPoint => ("goose.floating_point", "floating-point"),
            Field::OctetString => ("goose.octet_string", "octet-string"),
            Field::VisibleString => ("goose.visible_string", "visible-string"),
            Field::BinaryTime => ("goose.binary_time", "binary-time"),
            Field::Bcd => ("goose.bcd", "bcd"),
            Field::MmsString => ("goose.mMSString", "mMSString"),
            Field::UtcTime => ("goose.utc_time", "utc-time"),
            Field::Unknown => ("goose.unknown", "Unknown element"),
        }
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.abbrev())
    }
}

/// IEC 61850 UtcTime: seconds since epoch, 24-bit binary fraction, quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UtcTime {
    pub seconds: u32,
    pub fraction: u32,
    pub quality: u8,
}

impl UtcTime {
    pub const LEAP_SECOND_KNOWN: u8 = 0x80;
    pub const CLOCK_FAILURE: u8 = 0x40;
    pub const CLOCK_NOT_SYNCHRONIZED: u8 = 0x20;
    pub const ACCURACY_MASK: u8 = 0x1F;

    /// Fraction of second in nanoseconds.
    pub fn nanos(&self) -> u32 {
        ((u64::from(self.fraction) * 1_000_000_000) >> 24) as u32
    }

    /// Number of significant fraction bits (31 = unspecified).
    pub fn accuracy_bits(&self) -> u8 {
        self.quality & Self::ACCURACY_MASK
    }

    pub fn clock_failure(&self) -> bool {
        self.quality & Self::CLOCK_FAILURE != 0
    }

    pub fn clock_not_synchronized(&self) -> bool {
        self.quality & Self::CLOCK_NOT_SYNCHRONIZED != 0
    }
}

impl fmt::Display for UtcTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09} UTC", self.seconds, self.nanos())?;
        let mut flags = Vec::new();
        if self.quality & Self::LEAP_SECOND_KNOWN != 0 {
            flags.push("leap second known");
        }
        if self.clock_failure() {
            flags.push("clock failure");
        }
        if self.clock_not_synchronized() {
            flags.push("clock not synchronized");
        }
        if !flags.is_empty() {
            write!(f, " [{}]", flags.join(", "))?;
        }
        Ok(())
    }
}

fn hex_bytes<S: Serializer>(b: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&hex::encode(b))
}

/// Interpreted value of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Containers and marker-only fields.
    None,
    Uint(u64),
    Int(i64),
    Bool(bool),
    Float(f64),
    Text(String),
    Bytes(#[serde(serialize_with = "hex_bytes")] Vec<u8>),
    Time(UtcTime),
}

/// One decoded field: what, where, and its value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub field: Field,
    /// Nesting level in the presentation tree.
    pub depth: u8,
    pub offset: usize,
    pub len: usize,
    pub value: Value,
}

impl Record {
    /// Value text for a UI, with names for the SPDU id / payload tag tables.
    pub fn display_value(&self) -> String {
        let named = match (self.field, &self.value) {
            (Field::SpduId, Value::Uint(v)) => u8::try_from(*v).ok().and_then(spdu_id_name),
            (Field::PduTag, Value::Uint(v)) => u8::try_from(*v).ok().and_then(pdu_tag_name),
            _ => None,
        };

        match &self.value {
            Value::None => String::new(),
            Value::Uint(v) if self.field.is_hex() => match named {
                Some(name) => format!("{name} (0x{v:02x})"),
                None => format!("0x{v:02x} ({v})"),
            },
            Value::Uint(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Bool(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Text(s) => s.clone(),
            Value::Bytes(b) => hex::encode(b),
            Value::Time(t) => t.to_string(),
        }
    }
}

/// Marker kinds. Codes are stable filter names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    /// A fixed field or declared length ran past the captured bytes.
    MalformedLength,
    /// The PDU decoder consumed zero bytes.
    ZeroLengthPdu,
    /// UtcTime value with a length other than 8.
    MalformedUtcTime,
    /// Declared and actual lengths disagree (only when length checks warn).
    LengthMismatch,
}

impl MarkerKind {
    pub fn code(self) -> &'static str {
        match self {
            MarkerKind::MalformedLength => "rgoose.malformed.length",
            MarkerKind::ZeroLengthPdu => "goose.zero_pdu",
            MarkerKind::MalformedUtcTime => "goose.malformed.utctime",
            MarkerKind::LengthMismatch => "rgoose.length_mismatch",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            MarkerKind::MalformedLength | MarkerKind::ZeroLengthPdu => Severity::Error,
            MarkerKind::MalformedUtcTime | MarkerKind::LengthMismatch => Severity::Warn,
        }
    }
}

impl Serialize for MarkerKind {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warn,
    Error,
}

/// Error or warning attached to a byte position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub kind: MarkerKind,
    pub severity: Severity,
    pub offset: usize,
    pub message: String,
}

/// Framing header of one decoded GOOSE APDU inside an R-GOOSE payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ApduEntry {
    pub offset: usize,
    pub tag: u8,
    pub simulation: u8,
    pub appid: u16,
    pub declared_len: u16,
    /// Bytes the PDU decoder actually consumed.
    pub consumed: usize,
}

/// Ordered decode result for one frame.
#[derive(Debug, Clone, Serialize)]
pub struct Dissection {
    /// Protocol column label ("GOOSE" or "R-GOOSE").
    pub protocol: &'static str,
    pub records: Vec<Record>,
    pub markers: Vec<Marker>,
    pub apdus: Vec<ApduEntry>,
    /// Final cursor position.
    pub cursor: usize,
    #[serde(skip)]
    open: Vec<usize>,
}

impl Dissection {
    pub fn new(protocol: &'static str) -> Self {
        Self {
            protocol,
            records: Vec::new(),
            markers: Vec::new(),
            apdus: Vec::new(),
            cursor: 0,
            open: Vec::new(),
        }
    }

    /// Append a record and return its index.
    pub fn push(&mut self, field: Field, depth: u8, offset: usize, len: usize, value: Value) -> usize {
        self.records.push(Record { field, depth, offset, len, value });
        self.records.len() - 1
    }

    /// Append a container record whose end is set later by `close`.
    pub fn open(&mut self, field: Field, depth: u8, offset: usize) -> usize {
        let idx = self.push(field, depth, offset, 0, Value::None);
        self.open.push(idx);
        idx
    }

    /// Set the end of a container opened with `open`.
    pub fn close(&mut self, idx: usize, end: usize) {
        if let Some(r) = self.records.get_mut(idx) {
            r.len = end.saturating_sub(r.offset);
        }
        self.open.retain(|&i| i != idx);
    }

    /// Close every container still open (walk halted early).
    pub fn close_all(&mut self, end: usize) {
        for idx in std::mem::take(&mut self.open) {
            if let Some(r) = self.records.get_mut(idx) {
                r.len = end.saturating_sub(r.offset);
            }
        }
    }

    pub fn mark(&mut self, kind: MarkerKind, offset: usize, message: impl Into<String>) {
        self.markers.push(Marker {
            kind,
            severity: kind.severity(),
            offset,
            message: message.into(),
        });
    }

    pub fn mark_truncated(&mut self, t: Truncated) {
        self.mark(
            MarkerKind::MalformedLength,
            t.offset,
            format!(
                "need {} bytes at offset {}, only {} captured",
                t.needed, t.offset, t.available
            ),
        );
    }

    pub fn read_u8(&mut self, rd: &mut Reader<'_>, field: Field, depth: u8) -> Result<u8, Truncated> {
        let at = rd.pos();
        let v = rd.u8()?;
        self.push(field, depth, at, 1, Value::Uint(v.into()));
        Ok(v)
    }

    pub fn read_u16(&mut self, rd: &mut Reader<'_>, field: Field, depth: u8) -> Result<u16, Truncated> {
        let at = rd.pos();
        let v = rd.u16()?;
        self.push(field, depth, at, 2, Value::Uint(v.into()));
        Ok(v)
    }

    pub fn read_u32(&mut self, rd: &mut Reader<'_>, field: Field, depth: u8) -> Result<u32, Truncated> {
        let at = rd.pos();
        let v = rd.u32()?;
        self.push(field, depth, at, 4, Value::Uint(v.into()));
        Ok(v)
    }

    pub fn read_bytes(
        &mut self,
        rd: &mut Reader<'_>,
        field: Field,
        depth: u8,
        n: usize,
    ) -> Result<(), Truncated> {
        let at = rd.pos();
        let b = rd.take(n)?;
        self.push(field, depth, at, n, Value::Bytes(b.to_vec()));
        Ok(())
    }

    /// First record of `field`, if any.
    pub fn find(&self, field: Field) -> Option<&Record> {
        self.records.iter().find(|r| r.field == field)
    }

    pub fn count(&self, field: Field) -> usize {
        self.records.iter().filter(|r| r.field == field).count()
    }

    pub fn markers_of(&self, kind: MarkerKind) -> usize {
        self.markers.iter().filter(|m| m.kind == kind).count()
    }

    pub fn has_errors(&self) -> bool {
        self.markers.iter().any(|m| m.severity == Severity::Error)
    }

    /// First error marker as an `RgooseError`, for callers that want a `Result`.
    pub fn error(&self) -> Option<RgooseError> {
        self.markers
            .iter()
            .find(|m| m.severity == Severity::Error)
            .map(|m| match m.kind {
                MarkerKind::ZeroLengthPdu => RgooseError::ZeroLengthPdu(m.offset),
                _ => RgooseError::Malformed {
                    offset: m.offset,
                    detail: m.message.clone(),
                },
            })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn containers_close_to_given_end() {
        let mut d = Dissection::new("R-GOOSE");
        let outer = d.open(Field::SessionHeader, 0, 4);
        let inner = d.open(Field::SecurityInfo, 1, 10);
        d.close(inner, 21);
        d.close_all(30);
        assert_eq!(d.records[inner].len, 11);
        assert_eq!(d.records[outer].len, 26);
    }

    #[test]
    fn error_prefers_first_error_marker() {
        let mut d = Dissection::new("GOOSE");
        d.mark(MarkerKind::MalformedUtcTime, 3, "bad time");
        assert!(d.error().is_none());
        d.mark(MarkerKind::ZeroLengthPdu, 8, "zero");
        let err = d.error().unwrap();
        assert_eq!(err.code().as_str(), "ZERO_LENGTH_PDU");
    }

    #[test]
    fn display_uses_name_tables() {
        let r = Record {
            field: Field::SpduId,
            depth: 1,
            offset: 0,
            len: 1,
            value: Value::Uint(0xA1),
        };
        assert_eq!(r.display_value(), "GOOSE (0xa1)");

        let r = Record {
            field: Field::KeyId,
            depth: 2,
            offset: 0,
            len: 4,
            value: Value::Uint(16),
        };
        assert_eq!(r.display_value(), "0x10 (16)");
    }

    #[test]
    fn utc_time_fraction_to_nanos() {
        let t = UtcTime { seconds: 1, fraction: 0x80_0000, quality: 0x0A };
        assert_eq!(t.nanos(), 500_000_000);
        assert_eq!(t.accuracy_bits(), 10);
        assert_eq!(t.to_string(), "1.500000000 UTC");
    }

    #[test]
    fn record_serializes_with_abbrev_and_hex() {
        let r = Record {
            field: Field::InitVec,
            depth: 2,
            offset: 25,
            len: 2,
            value: Value::Bytes(vec![0xDE, 0xAD]),
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["field"], "rgoose.init_v");
        assert_eq!(v["value"]["type"], "bytes");
        assert_eq!(v["value"]["value"], "dead");
    }
}
