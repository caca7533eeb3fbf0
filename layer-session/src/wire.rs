//! Little-endian [`Reader`] and [`Writer`] for the session file codec.
//!
//! Every integer in the session files is stored little-endian at its natural
//! width; there is no padding and no alignment.

use crate::errors::CodecError;

// ─── Reader ──────────────────────────────────────────────────────────────────

/// A bounds-checked cursor over an in-memory byte slice.
///
/// The only error it can produce is [`CodecError::Truncated`]; range checks on
/// the values themselves belong to the codec.
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn from_slice(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Remaining bytes.
    pub fn remaining(&self) -> usize { self.buf.len() - self.pos }

    /// Borrow the next `n` bytes.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let end = self.pos.checked_add(n).ok_or(CodecError::Truncated)?;
        if end > self.buf.len() {
            return Err(CodecError::Truncated);
        }
        let s = &self.buf[self.pos..end];
        self.pos = end;
        Ok(s)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        self.read_array::<4>().map(i32::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        self.read_array::<4>().map(u32::from_le_bytes)
    }

    pub fn read_i64(&mut self) -> Result<i64, CodecError> {
        self.read_array::<8>().map(i64::from_le_bytes)
    }

    /// Read the 4-byte magic and check it against `expected`.
    pub fn expect_magic(&mut self, expected: u32) -> Result<(), CodecError> {
        let found = self.read_u32()?;
        if found != expected {
            return Err(CodecError::BadMagic { expected, found });
        }
        Ok(())
    }

    /// Read an `i32` length prefix that must fall in `0..limit`, then that many
    /// bytes as (lossy) UTF-8.
    pub fn read_string(&mut self, field: &'static str, limit: i32) -> Result<String, CodecError> {
        let len = self.read_i32()?;
        if !(0..limit).contains(&len) {
            return Err(CodecError::OutOfRange { field, value: len.into() });
        }
        let raw = self.read_bytes(len as usize)?;
        Ok(String::from_utf8_lossy(raw).into_owned())
    }
}

// ─── Writer ──────────────────────────────────────────────────────────────────

/// Append-only byte sink with the ability to patch a previously written word.
#[derive(Default)]
pub(crate) struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self { Self::default() }

    /// Current length, i.e. the offset the next write lands at.
    pub fn offset(&self) -> usize { self.buf.len() }

    pub fn put_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn put_i32(&mut self, v: i32) { self.put_bytes(&v.to_le_bytes()); }

    pub fn put_u32(&mut self, v: u32) { self.put_bytes(&v.to_le_bytes()); }

    pub fn put_i64(&mut self, v: i64) { self.put_bytes(&v.to_le_bytes()); }

    /// `i32` length prefix followed by the bytes themselves.
    pub fn put_string(&mut self, s: &str) {
        self.put_i32(s.len() as i32);
        self.put_bytes(s.as_bytes());
    }

    /// Overwrite the `i32` at `offset`, which must have been written earlier.
    pub fn patch_i32(&mut self, offset: usize, v: i32) {
        self.buf[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
    }

    pub fn into_bytes(self) -> Vec<u8> { self.buf }
}
