//! Top-level facade crate for rgoose.
//!
//! Re-exports the decoder core and the tap library so users can depend on a single crate.

pub mod core {
    pub use rgoose_core::*;
}

pub mod tap {
    pub use rgoose_tap::*;
}
