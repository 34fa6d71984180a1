//! Framing detection and dispatch.
//!
//! Hosts decide which walker applies to a frame. These helpers cover the two
//! UDP cases (R-GOOSE directly, or inside a CLTP unit-data TPDU) and route an
//! identified frame to the right walker.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RgooseError};
use crate::protocol::pdu::PduDecoder;
use crate::protocol::record::Dissection;
use crate::protocol::rgoose::{self, WalkOptions, SPDU_GOOSE};
use crate::protocol::goose;

/// Smallest buffer that can hold an R-GOOSE session header.
pub const MIN_RGOOSE_LEN: usize = 27;

/// CLTP unit-data TPDU code (high nibble of the second octet).
pub const CLTP_UD_TPDU: u8 = 0x4;

/// How a frame is framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// Layer 2 GOOSE, starting at APPID.
    Goose,
    /// Bare R-GOOSE SPDU.
    Rgoose,
    /// CLTP unit-data TPDU carrying an R-GOOSE SPDU.
    Cltp,
}

/// `buf` starts with an R-GOOSE SPDU.
pub fn is_rgoose(buf: &[u8]) -> bool {
    buf.len() >= MIN_RGOOSE_LEN && buf.first() == Some(&SPDU_GOOSE)
}

/// Offset of the GOOSE SPDU inside a CLTP unit-data TPDU, if `buf` is one.
pub fn cltp_user_data(buf: &[u8]) -> Option<usize> {
    let (&li, &code) = (buf.first()?, buf.get(1)?);
    if (code & 0xF0) >> 4 != CLTP_UD_TPDU {
        return None;
    }
    let spdu_at = usize::from(li) + 1;
    match buf.get(spdu_at) {
        Some(&SPDU_GOOSE) => Some(spdu_at),
        _ => None,
    }
}

/// Guess the framing of a UDP payload.
pub fn classify_datagram(buf: &[u8]) -> Option<Framing> {
    if cltp_user_data(buf).is_some() {
        Some(Framing::Cltp)
    } else if is_rgoose(buf) {
        Some(Framing::Rgoose)
    } else {
        None
    }
}

/// Walk `buf` with the walker `framing` selects.
///
/// R-GOOSE framings are checked first; a buffer that fails the check is
/// `NotRgoose` and nothing is decoded.
pub fn dissect(
    framing: Framing,
    buf: &[u8],
    decoder: &dyn PduDecoder,
    opts: &WalkOptions,
) -> Result<Dissection> {
    match framing {
        Framing::Goose => Ok(goose::walk(buf, decoder, opts)),
        Framing::Rgoose => {
            if !is_rgoose(buf) {
                return Err(RgooseError::NotRgoose);
            }
            Ok(rgoose::walk(buf, 0, decoder, opts))
        }
        Framing::Cltp => {
            let start = cltp_user_data(buf).ok_or(RgooseError::NotRgoose)?;
            let spdu = buf.get(start..).ok_or(RgooseError::NotRgoose)?;
            if !is_rgoose(spdu) {
                return Err(RgooseError::NotRgoose);
            }
            Ok(rgoose::walk(buf, start, decoder, opts))
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::protocol::pdu::BerGooseDecoder;

    fn spdu() -> Vec<u8> {
        let mut v = vec![SPDU_GOOSE];
        v.resize(MIN_RGOOSE_LEN + 2, 0);
        v
    }

    #[test]
    fn rgoose_needs_min_len_and_id() {
        assert!(is_rgoose(&spdu()));
        assert!(!is_rgoose(&spdu()[..MIN_RGOOSE_LEN - 1]));
        let mut other = spdu();
        other[0] = rgoose::SPDU_SV;
        assert!(!is_rgoose(&other));
    }

    #[test]
    fn cltp_header_is_skipped() {
        let mut buf = vec![0x03, 0x40, 0xC1, 0x00];
        buf.extend(spdu());
        assert_eq!(cltp_user_data(&buf), Some(4));
        assert_eq!(classify_datagram(&buf), Some(Framing::Cltp));

        let d = dissect(Framing::Cltp, &buf, &BerGooseDecoder::default(), &WalkOptions::default()).unwrap();
        assert_eq!(d.records[0].offset, 4);
    }

    #[test]
    fn cltp_rejects_other_tpdus_and_spdus() {
        assert_eq!(cltp_user_data(&[0x01, 0x50, 0xA1]), None);
        assert_eq!(cltp_user_data(&[0x01, 0x40, 0xA2]), None);
        assert_eq!(cltp_user_data(&[0x05, 0x40]), None);
        assert_eq!(cltp_user_data(&[0x01]), None);
    }

    #[test]
    fn dissect_refuses_non_rgoose() {
        let err = dissect(Framing::Rgoose, &[0xA1, 0x00], &BerGooseDecoder::default(), &WalkOptions::default())
            .unwrap_err();
        assert_eq!(err.code().as_str(), "NOT_RGOOSE");
        assert_eq!(classify_datagram(&[0x00; 40]), None);
    }
}
