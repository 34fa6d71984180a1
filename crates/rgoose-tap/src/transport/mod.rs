//! Network frame sources.

pub mod udp;
