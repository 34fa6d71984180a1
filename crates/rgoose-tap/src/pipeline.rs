//! Decode one frame: pick the framing, walk it, and account for the result.

use std::time::Instant;

use tracing::{debug, warn};

use rgoose_core::error::{Result, RgooseError};
use rgoose_core::protocol::record::Severity;
use rgoose_core::protocol::sniff::{self, Framing};
use rgoose_core::protocol::Dissection;

use crate::app_state::AppState;

pub fn framing_label(framing: Framing) -> &'static str {
    match framing {
        Framing::Goose => "goose",
        Framing::Rgoose => "rgoose",
        Framing::Cltp => "cltp",
    }
}

/// Walk `buf`. With `framing == None` the framing is sniffed as a UDP payload.
pub fn process(state: &AppState, framing: Option<Framing>, buf: &[u8]) -> Result<Dissection> {
    let metrics = state.metrics();

    let framing = match framing.or_else(|| sniff::classify_datagram(buf)) {
        Some(f) => f,
        None => {
            metrics.rejected.inc(&[("reason", "not_rgoose")]);
            return Err(RgooseError::NotRgoose);
        }
    };
    let label = framing_label(framing);

    let started = Instant::now();
    let res = sniff::dissect(framing, buf, state.decoder(), state.walk_options());
    metrics.decode_duration.observe(&[("framing", label)], started.elapsed());

    let d = match res {
        Ok(d) => d,
        Err(e) => {
            metrics.rejected.inc(&[("reason", "not_rgoose")]);
            return Err(e);
        }
    };

    let outcome = if d.has_errors() {
        "error"
    } else if d.markers.iter().any(|m| m.severity == Severity::Warn) {
        "warn"
    } else {
        "ok"
    };
    metrics.frames.inc(&[("framing", label), ("outcome", outcome)]);
    metrics.apdus.add(&[("framing", label)], d.apdus.len() as u64);
    for m in &d.markers {
        metrics.markers.inc(&[("code", m.kind.code())]);
    }

    if let Some(err) = d.error() {
        warn!(framing = label, len = buf.len(), error = %err, "frame decoded with errors");
    } else {
        debug!(framing = label, len = buf.len(), records = d.records.len(), apdus = d.apdus.len(), "frame decoded");
    }

    Ok(d)
}
