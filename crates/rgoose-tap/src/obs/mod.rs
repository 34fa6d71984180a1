//! In-process metrics for the tap.
//!
//! Counters and the decode-latency histogram are stored as atomics and
//! rendered by the `/metrics` handler.

pub mod metrics;
