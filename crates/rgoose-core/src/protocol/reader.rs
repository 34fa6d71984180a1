//! Bounds-checked big-endian reader over a borrowed frame.
//!
//! Same rules as the rest of the protocol code: no raw indexing, every read
//! goes through `get()` windows and `bytes::Buf`, and running past the captured
//! bytes surfaces as `Truncated` instead of a panic.

use bytes::Buf;

/// A read would run past the captured bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Truncated {
    /// Offset the read started at.
    pub offset: usize,
    /// Bytes the read needed.
    pub needed: usize,
    /// Bytes that were left.
    pub available: usize,
}

/// Cursor over an immutable frame. Offsets are absolute within `buf`.
#[derive(Debug, Clone, Copy)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    /// Whole frame, independent of the cursor.
    pub fn buffer(&self) -> &'a [u8] {
        self.buf
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn captured_len(&self) -> usize {
        self.buf.len()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn peek_u8(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    /// Move the cursor to an absolute offset (e.g. one returned by a PDU decoder).
    pub fn seek(&mut self, pos: usize) -> Result<(), Truncated> {
        if pos > self.buf.len() {
            return Err(Truncated {
                offset: self.pos,
                needed: pos.saturating_sub(self.pos),
                available: self.remaining(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    fn window(&self, n: usize) -> Result<&'a [u8], Truncated> {
        self.pos
            .checked_add(n)
            .and_then(|end| self.buf.get(self.pos..end))
            .ok_or(Truncated {
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            })
    }

    pub fn u8(&mut self) -> Result<u8, Truncated> {
        let mut w = self.window(1)?;
        self.pos += 1;
        Ok(w.get_u8())
    }

    pub fn u16(&mut self) -> Result<u16, Truncated> {
        let mut w = self.window(2)?;
        self.pos += 2;
        Ok(w.get_u16())
    }

    pub fn u32(&mut self) -> Result<u32, Truncated> {
        let mut w = self.window(4)?;
        self.pos += 4;
        Ok(w.get_u32())
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8], Truncated> {
        let w = self.window(n)?;
        self.pos += n;
        Ok(w)
    }
}
