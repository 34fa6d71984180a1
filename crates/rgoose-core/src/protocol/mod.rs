//! Protocol modules (GOOSE + R-GOOSE).
//!
//! - `rgoose`: session header / security info / payload / padding / MAC walk.
//! - `goose`: layer 2 header walk.
//! - `pdu` + `ber`: the GOOSEpdu decoder both walkers delegate to.
//! - `sniff`: framing detection for UDP payloads.
//!
//! All parsers are panic-free: malformed input is reported as markers on the
//! `Dissection` instead of panicking or indexing raw buffers.

pub mod ber;
pub mod goose;
pub mod pdu;
pub mod reader;
pub mod record;
pub mod rgoose;
pub mod sniff;

pub use pdu::{BerGooseDecoder, PduDecoder};
pub use record::{Dissection, Field, Marker, MarkerKind, Record, Severity, Value};
pub use rgoose::{LengthChecks, WalkOptions};
pub use sniff::Framing;
