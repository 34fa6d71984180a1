//! Layer 2 GOOSE walker (ethertype 0x88B8).
//!
//! Header: APPID u16 | Length u16 | Reserved 1 u16 | Reserved 2 u16, then
//! GOOSEpdus until the cursor reaches the declared Length.

use tracing::debug;

use crate::protocol::pdu::PduDecoder;
use crate::protocol::reader::{Reader, Truncated};
use crate::protocol::record::{Dissection, Field, MarkerKind};
use crate::protocol::rgoose::WalkOptions;

pub const PROTOCOL: &str = "GOOSE";

pub const ETHERTYPE_GOOSE: u16 = 0x88B8;

pub const HEADER_SIZE: usize = 8;

/// Walk one GOOSE APDU (APPID onwards).
pub fn walk(buf: &[u8], decoder: &dyn PduDecoder, opts: &WalkOptions) -> Dissection {
    let mut out = Dissection::new(PROTOCOL);
    let mut rd = Reader::new(buf, 0);

    if let Err(t) = walk_apdu(&mut rd, decoder, opts, &mut out) {
        debug!(offset = t.offset, "GOOSE walk truncated");
        out.mark_truncated(t);
    }

    out.cursor = rd.pos();
    out.close_all(buf.len());
    out
}

fn walk_apdu(
    rd: &mut Reader<'_>,
    decoder: &dyn PduDecoder,
    opts: &WalkOptions,
    out: &mut Dissection,
) -> Result<(), Truncated> {
    out.open(Field::Goose, 0, 0);
    out.read_u16(rd, Field::Appid, 1)?;
    let length = usize::from(out.read_u16(rd, Field::Length, 1)?);
    out.read_u16(rd, Field::Reserve1, 1)?;
    out.read_u16(rd, Field::Reserve2, 1)?;

    if opts.warn() && length > rd.captured_len() {
        out.mark(
            MarkerKind::LengthMismatch,
            2,
            format!("Length {length} exceeds captured {} bytes", rd.captured_len()),
        );
    }

    while rd.pos() < length {
        let at = rd.pos();
        let next = decoder.decode_pdu(rd.buffer(), at, 1, out);
        if next <= at {
            out.mark(MarkerKind::ZeroLengthPdu, at, "Internal error, zero-byte GOOSE PDU");
            debug!(offset = at, "GOOSE PDU decoder made no progress");
            break;
        }
        rd.seek(next)?;
    }
    Ok(())
}
