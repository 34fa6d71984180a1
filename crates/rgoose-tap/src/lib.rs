//! rgoose tap library entry.
//!
//! This crate hosts the decoder core: it loads config, receives R-GOOSE
//! datagrams (or reads hex frame files), walks each frame, renders the
//! result, and exposes metrics. It is consumed by the binary (`main.rs`) and
//! by integration tests.

pub mod app_state;
pub mod config;
pub mod input;
pub mod obs;
pub mod ops;
pub mod pipeline;
pub mod render;
pub mod router;
pub mod transport;
