//! Framing properties of the R-GOOSE walker, driven with stub PDU decoders.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::cell::Cell;

use rgoose_core::protocol::record::{Dissection, Field, MarkerKind, Value};
use rgoose_core::protocol::rgoose::{self, FIXED_PREFIX_SIZE, PADDING_TAG, PDU_GOOSE, PDU_SV, SPDU_GOOSE};
use rgoose_core::protocol::{BerGooseDecoder, PduDecoder, WalkOptions};

fn prefix(iv_len: u8, payload_len: u32) -> Vec<u8> {
    let mut v = vec![SPDU_GOOSE, 0x18, 0x80, 0x16];
    v.extend_from_slice(&[0, 0, 0, 0x40, 0, 0, 0, 0x01, 0x00, 0x02]);
    v.extend_from_slice(&[0, 0, 0, 1, 0, 2, 0, 0, 0, 3]);
    v.push(iv_len);
    v.extend(std::iter::repeat(0xEE).take(usize::from(iv_len)));
    v.extend_from_slice(&payload_len.to_be_bytes());
    v
}

fn apdu_header(tag: u8, len: u16) -> Vec<u8> {
    let mut v = vec![tag, 0x00, 0x10, 0x01];
    v.extend_from_slice(&len.to_be_bytes());
    v
}

/// Consumes `step` bytes on each of the first `good` calls, then nothing.
struct Stub {
    step: usize,
    good: usize,
    calls: Cell<usize>,
}

impl Stub {
    fn new(step: usize, good: usize) -> Self {
        Self { step, good, calls: Cell::new(0) }
    }
}

impl PduDecoder for Stub {
    fn decode_pdu(&self, buf: &[u8], offset: usize, _depth: u8, _out: &mut Dissection) -> usize {
        let n = self.calls.get();
        self.calls.set(n + 1);
        if n < self.good {
            (offset + self.step).min(buf.len())
        } else {
            offset
        }
    }
}

fn walk(buf: &[u8], decoder: &dyn PduDecoder) -> Dissection {
    rgoose::walk(buf, 0, decoder, &WalkOptions::default())
}

#[test]
fn fixed_prefix_consumes_29_plus_iv() {
    for iv_len in [0u8, 1, 16, 255] {
        let buf = prefix(iv_len, 0);
        let d = walk(&buf, &Stub::new(0, 0));
        assert_eq!(d.cursor, FIXED_PREFIX_SIZE + usize::from(iv_len));
        assert!(d.markers.is_empty(), "iv_len={iv_len}");
    }
}

#[test]
fn empty_payload_never_calls_decoder() {
    let buf = prefix(0, 0);
    let stub = Stub::new(1, usize::MAX);
    let d = walk(&buf, &stub);

    assert_eq!(stub.calls.get(), 0);
    assert!(d.apdus.is_empty());
    assert_eq!(d.count(Field::PduTag), 0);
    assert_eq!(d.count(Field::Padding), 0);
    assert_eq!(d.count(Field::Hmac), 0);
    assert_eq!(d.count(Field::SpduId), 1);
    assert_eq!(d.count(Field::PayloadLen), 1);
}

#[test]
fn non_goose_first_entry_skips_decode_and_keeps_trailer() {
    let mut buf = prefix(0, 10);
    buf.extend(apdu_header(PDU_SV, 4));
    let post_header = buf.len();
    buf.extend_from_slice(&[PADDING_TAG, 0x01, 0x00, 0xCA, 0xFE]);

    let stub = Stub::new(4, usize::MAX);
    let d = walk(&buf, &stub);

    assert_eq!(stub.calls.get(), 0);
    assert!(d.apdus.is_empty());
    assert_eq!(d.find(Field::Padding).unwrap().offset, post_header);
    assert_eq!(d.find(Field::PaddingLen).unwrap().value, Value::Uint(1));
    let mac = d.find(Field::Hmac).unwrap();
    assert_eq!(mac.offset, post_header + 3);
    assert_eq!(mac.value, Value::Bytes(vec![0xCA, 0xFE]));
    assert_eq!(d.cursor, buf.len());
}

#[test]
fn zero_progress_yields_one_marker_and_stops() {
    let mut buf = prefix(0, 3 * 8);
    for _ in 0..3 {
        buf.extend(apdu_header(PDU_GOOSE, 2));
        buf.extend_from_slice(&[0x61, 0x00]);
    }
    buf.extend_from_slice(&[PADDING_TAG, 0x00]);

    let stub = Stub::new(2, 1);
    let d = walk(&buf, &stub);

    assert_eq!(stub.calls.get(), 2);
    assert_eq!(d.apdus.len(), 1);
    assert_eq!(d.markers_of(MarkerKind::ZeroLengthPdu), 1);
    assert_eq!(d.markers.len(), 1);
    assert_eq!(d.count(Field::PduTag), 2);
    assert_eq!(d.count(Field::Padding), 0);
    assert_eq!(d.cursor, FIXED_PREFIX_SIZE + 8 + 6);
    assert_eq!(d.error().unwrap().code().as_str(), "ZERO_LENGTH_PDU");
}

#[test]
fn declared_lengths_drive_the_loop() {
    // payload_len covers one APDU; a second well-formed APDU follows but is
    // outside the payload and ends up in the MAC.
    let mut buf = prefix(0, 8);
    for _ in 0..2 {
        buf.extend(apdu_header(PDU_GOOSE, 2));
        buf.extend_from_slice(&[0x61, 0x00]);
    }
    let d = walk(&buf, &BerGooseDecoder::default());

    assert_eq!(d.apdus.len(), 1);
    assert_eq!(d.apdus[0].consumed, 2);
    assert_eq!(d.find(Field::Hmac).unwrap().len, 8);
}

#[test]
fn padding_requires_tag_and_two_bytes() {
    let mut with_padding = prefix(0, 0);
    with_padding.extend_from_slice(&[PADDING_TAG, 0x02, 0x00, 0x00]);
    let d = walk(&with_padding, &Stub::new(0, 0));
    assert_eq!(d.count(Field::Padding), 1);
    assert_eq!(d.find(Field::PaddingBytes).unwrap().len, 2);
    assert_eq!(d.count(Field::Hmac), 0);

    let mut not_tag = prefix(0, 0);
    not_tag.extend_from_slice(&[0xAE, 0x02, 0x00, 0x00]);
    let d = walk(&not_tag, &Stub::new(0, 0));
    assert_eq!(d.count(Field::Padding), 0);
    assert_eq!(d.find(Field::Hmac).unwrap().len, 4);
}

#[test]
fn padding_overrun_is_malformed() {
    let mut buf = prefix(0, 0);
    buf.extend_from_slice(&[PADDING_TAG, 0x09, 0x00]);
    let d = walk(&buf, &Stub::new(0, 0));
    assert_eq!(d.markers_of(MarkerKind::MalformedLength), 1);
    assert_eq!(d.count(Field::PaddingLen), 1);
    assert_eq!(d.count(Field::PaddingBytes), 0);
    assert_eq!(d.cursor, buf.len() - 1);
    assert_eq!(d.error().unwrap().code().as_str(), "MALFORMED");
}

#[test]
fn truncated_apdu_header_keeps_prefix() {
    let mut buf = prefix(0, 6);
    buf.extend_from_slice(&[PDU_GOOSE, 0x00, 0x10]);
    let d = walk(&buf, &Stub::new(0, 0));
    assert_eq!(d.markers_of(MarkerKind::MalformedLength), 1);
    assert_eq!(d.count(Field::ApduSimulation), 1);
    assert_eq!(d.count(Field::ApduAppid), 0);
    assert!(d.records.iter().all(|r| r.offset + r.len <= buf.len()));
}

#[test]
fn independent_walks_run_concurrently() {
    let mut buf = prefix(4, 0);
    buf.extend_from_slice(&[0x11; 16]);
    let expected = walk(&buf, &BerGooseDecoder::default()).records;

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(|| walk(&buf, &BerGooseDecoder::default()).records))
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), expected);
        }
    });
}
