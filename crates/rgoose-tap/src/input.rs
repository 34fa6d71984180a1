//! Hex frame files: one frame per line.
//!
//! Blank lines and `#` comments are skipped. Whitespace and `:` separators
//! inside a line are ignored, so Wireshark "copy as hex" output works as is.

use rgoose_core::error::{Result, RgooseError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexFrame {
    /// 1-based line number in the source.
    pub line: usize,
    pub bytes: Vec<u8>,
}

pub fn parse_hex_lines(src: &str) -> Result<Vec<HexFrame>> {
    let mut frames = Vec::new();
    for (i, raw) in src.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        let digits: String = line
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ':')
            .collect();
        let bytes = hex::decode(&digits)
            .map_err(|e| RgooseError::BadRequest(format!("line {}: invalid hex: {e}", i + 1)))?;
        frames.push(HexFrame { line: i + 1, bytes });
    }
    Ok(frames)
}
