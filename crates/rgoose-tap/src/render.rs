//! Presentation of a `Dissection`: an indented field tree or one JSON line.

use std::fmt::Write;

use serde::Serialize;

use rgoose_core::error::{Result, RgooseError};
use rgoose_core::protocol::{Dissection, Severity};

/// Indented tree, one record per line, markers last.
pub fn text(d: &Dissection, frame_len: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}, {} bytes captured, {} APDU(s)",
        d.protocol,
        frame_len,
        d.apdus.len()
    );

    for r in &d.records {
        let indent = "  ".repeat(usize::from(r.depth) + 1);
        let value = r.display_value();
        if value.is_empty() {
            let _ = writeln!(out, "{indent}{} [{}+{}]", r.field.name(), r.offset, r.len);
        } else {
            let _ = writeln!(out, "{indent}{}: {} [{}+{}]", r.field.name(), value, r.offset, r.len);
        }
    }

    for m in &d.markers {
        let severity = match m.severity {
            Severity::Warn => "warn",
            Severity::Error => "error",
        };
        let _ = writeln!(out, "  [{severity}] {} @{}: {}", m.kind.code(), m.offset, m.message);
    }
    out
}

#[derive(Serialize)]
struct FrameReport<'a> {
    source: &'a str,
    len: usize,
    #[serde(flatten)]
    dissection: &'a Dissection,
}

/// Single-line JSON report for `d`, tagged with where the frame came from.
pub fn json_line(source: &str, frame_len: usize, d: &Dissection) -> Result<String> {
    serde_json::to_string(&FrameReport {
        source,
        len: frame_len,
        dissection: d,
    })
    .map_err(|e| RgooseError::Internal(format!("json encode failed: {e}")))
}
