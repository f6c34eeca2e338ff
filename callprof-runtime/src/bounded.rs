//! Fixed-capacity strings for source descriptors.
//!
//! Frames and records keep their own copies of the host's source/name strings
//! so the event path never allocates. Anything longer than the buffer is cut
//! at the last char boundary that fits.

use std::fmt;

use crate::host::CallInfo;

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BoundedStr<const N: usize> {
    len: usize,
    buf: [u8; N],
}

/// Chunk name or file path of the defining source.
pub type SourceBuf = BoundedStr<63>;
/// Human-readable function name.
pub type NameBuf = BoundedStr<31>;
/// Name-kind (`global`, `method`, `local`...) and call-kind (`Lua`, `C`, `main`).
pub type KindBuf = BoundedStr<7>;

impl<const N: usize> BoundedStr<N> {
    pub const CAPACITY: usize = N;

    pub const fn new() -> Self {
        Self { len: 0, buf: [0; N] }
    }

    /// Copy `s`, truncating on a char boundary if it does not fit.
    pub fn truncated(s: &str) -> Self {
        let mut end = s.len().min(N);
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        let mut buf = [0u8; N];
        buf[..end].copy_from_slice(&s.as_bytes()[..end]);
        Self { len: end, buf }
    }

    pub fn as_str(&self) -> &str {
        // Only ever filled from a `&str` prefix that ends on a char boundary.
        std::str::from_utf8(&self.buf[..self.len]).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<const N: usize> Default for BoundedStr<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Debug for BoundedStr<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl<const N: usize> fmt::Display for BoundedStr<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a function was defined and what the host calls it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceInfo {
    pub source: SourceBuf,
    pub name: NameBuf,
    pub namewhat: KindBuf,
    pub what: KindBuf,
    pub line: i32,
}

impl SourceInfo {
    /// Missing fields become empty strings.
    pub fn from_call(info: &CallInfo<'_>) -> Self {
        Self {
            source: SourceBuf::truncated(info.source.unwrap_or("")),
            name: NameBuf::truncated(info.name.unwrap_or("")),
            namewhat: KindBuf::truncated(info.namewhat.unwrap_or("")),
            what: KindBuf::truncated(info.what.unwrap_or("")),
            line: info.line,
        }
    }
}
