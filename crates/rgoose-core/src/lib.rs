//! rgoose core: host-independent IEC 61850 GOOSE / R-GOOSE decoding.
//!
//! This crate walks GOOSE frames (layer 2) and R-GOOSE SPDUs (session header,
//! security info, payload, padding, trailing MAC) and produces an ordered list
//! of field records plus error/warning markers. It carries no transport or
//! runtime dependencies so any host (a capture tap, a test harness, a UI) can
//! drive it.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Malformed input is reported through markers on the `Dissection` or as
//! `RgooseError`, never by crashing.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorCode, Result, RgooseError};
