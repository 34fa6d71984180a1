//! Minimal BER (X.690) TLV reading for GOOSE PDUs.
//!
//! Only what GOOSE needs: low tag numbers, definite lengths (short form or up
//! to four long-form octets), and primitive value interpretation.

use thiserror::Error;

use crate::protocol::record::UtcTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BerError {
    #[error("truncated TLV at offset {0}")]
    Truncated(usize),
    #[error("high tag number form at offset {0}")]
    HighTagNumber(usize),
    #[error("indefinite length at offset {0}")]
    IndefiniteLength(usize),
    #[error("length of length too large at offset {0}")]
    LengthTooLong(usize),
}

/// One TLV. `value` borrows the frame; offsets are absolute.
#[derive(Debug, Clone, Copy)]
pub struct Tlv<'a> {
    /// Identifier octet (class, constructed bit, tag number).
    pub ident: u8,
    pub offset: usize,
    pub value_offset: usize,
    pub value: &'a [u8],
}

impl<'a> Tlv<'a> {
    /// Offset just past this TLV.
    pub fn end(&self) -> usize {
        self.value_offset + self.value.len()
    }

    pub fn total_len(&self) -> usize {
        self.end() - self.offset
    }

    /// Iterate children of a constructed TLV. Offsets stay absolute.
    pub fn children(&self) -> Children<'a> {
        Children {
            buf: self.value,
            base: self.value_offset,
            pos: 0,
        }
    }
}

/// Read one TLV starting at `offset` in `buf`.
pub fn read_tlv(buf: &[u8], offset: usize) -> Result<Tlv<'_>, BerError> {
    let truncated = BerError::Truncated(offset);
    let ident = *buf.get(offset).ok_or(truncated)?;
    if ident & 0x1F == 0x1F {
        return Err(BerError::HighTagNumber(offset));
    }

    let first = *buf.get(offset + 1).ok_or(truncated)?;
    let (len, header) = match first {
        0x80 => return Err(BerError::IndefiniteLength(offset)),
        n if n < 0x80 => (usize::from(n), 2),
        n => {
            let count = usize::from(n & 0x7F);
            if count > 4 {
                return Err(BerError::LengthTooLong(offset));
            }
            let octets = buf.get(offset + 2..offset + 2 + count).ok_or(truncated)?;
            let len = octets.iter().fold(0usize, |acc, &b| (acc << 8) | usize::from(b));
            (len, 2 + count)
        }
    };

    let value_offset = offset + header;
    let value = value_offset
        .checked_add(len)
        .and_then(|end| buf.get(value_offset..end))
        .ok_or(truncated)?;

    Ok(Tlv {
        ident,
        offset,
        value_offset,
        value,
    })
}

/// Iterator over the TLVs nested in a constructed value.
pub struct Children<'a> {
    buf: &'a [u8],
    base: usize,
    pos: usize,
}

impl<'a> Iterator for Children<'a> {
    type Item = Result<Tlv<'a>, BerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.buf.len() {
            return None;
        }
        match read_tlv(self.buf, self.pos) {
            Ok(t) => {
                self.pos = t.end();
                Some(Ok(Tlv {
                    ident: t.ident,
                    offset: self.base + t.offset,
                    value_offset: self.base + t.value_offset,
                    value: t.value,
                }))
            }
            Err(e) => {
                self.pos = self.buf.len();
                Some(Err(rebase(e, self.base)))
            }
        }
    }
}

fn rebase(e: BerError, base: usize) -> BerError {
    match e {
        BerError::Truncated(o) => BerError::Truncated(o + base),
        BerError::HighTagNumber(o) => BerError::HighTagNumber(o + base),
        BerError::IndefiniteLength(o) => BerError::IndefiniteLength(o + base),
        BerError::LengthTooLong(o) => BerError::LengthTooLong(o + base),
    }
}

/// Two's complement INTEGER, up to 8 octets.
pub fn integer(v: &[u8]) -> Option<i64> {
    if v.is_empty() || v.len() > 8 {
        return None;
    }
    let init: i64 = if v.first().is_some_and(|b| b & 0x80 != 0) { -1 } else { 0 };
    Some(v.iter().fold(init, |acc, &b| (acc << 8) | i64::from(b)))
}

/// Unsigned value; allows one leading zero octet beyond 8 bytes.
pub fn unsigned(v: &[u8]) -> Option<u64> {
    let v = match v {
        [0, rest @ ..] if rest.len() == 8 => rest,
        _ => v,
    };
    if v.is_empty() || v.len() > 8 {
        return None;
    }
    Some(v.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
}

pub fn boolean(v: &[u8]) -> Option<bool> {
    match v {
        [b] => Some(*b != 0),
        _ => None,
    }
}

/// MMS floating-point: exponent width octet followed by IEEE 754 bits.
pub fn floating_point(v: &[u8]) -> Option<f64> {
    match v {
        [_, a, b, c, d] => Some(f64::from(f32::from_be_bytes([*a, *b, *c, *d]))),
        [_, rest @ ..] if rest.len() == 8 => {
            let mut bits = [0u8; 8];
            bits.copy_from_slice(rest);
            Some(f64::from_be_bytes(bits))
        }
        _ => None,
    }
}

/// Eight octets: seconds, 24-bit fraction, quality.
pub fn utc_time(v: &[u8]) -> Option<UtcTime> {
    match v {
        [s0, s1, s2, s3, f0, f1, f2, q] => Some(UtcTime {
            seconds: u32::from_be_bytes([*s0, *s1, *s2, *s3]),
            fraction: u32::from_be_bytes([0, *f0, *f1, *f2]),
            quality: *q,
        }),
        _ => None,
    }
}

pub fn text(v: &[u8]) -> String {
    String::from_utf8_lossy(v).into_owned()
}
