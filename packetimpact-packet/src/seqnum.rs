//! 32-bit TCP sequence numbers
//!
//! Arithmetic wraps modulo 2^32 and comparisons follow RFC 1982 serial
//! number arithmetic: `a < b` when the forward distance from `a` to `b` is
//! less than 2^31.

use std::fmt;

/// A TCP sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SeqNum(pub u32);

impl SeqNum {
    pub const fn new(value: u32) -> Self {
        SeqNum(value)
    }

    pub const fn value(self) -> u32 {
        self.0
    }

    /// The sequence number `size` bytes ahead of `self`
    pub const fn add(self, size: u32) -> SeqNum {
        SeqNum(self.0.wrapping_add(size))
    }

    /// Advance `self` in place by `size` bytes
    pub fn update_forward(&mut self, size: u32) {
        *self = self.add(size);
    }

    /// Number of bytes from `self` up to `end`
    pub const fn size_to(self, end: SeqNum) -> u32 {
        end.0.wrapping_sub(self.0)
    }

    pub const fn less_than(self, other: SeqNum) -> bool {
        (self.0.wrapping_sub(other.0) as i32) < 0
    }

    pub const fn less_than_eq(self, other: SeqNum) -> bool {
        self.0 == other.0 || self.less_than(other)
    }

    /// Whether `self` lies in the half-open window `[start, end)`
    pub const fn in_range(self, start: SeqNum, end: SeqNum) -> bool {
        start.less_than_eq(self) && self.less_than(end)
    }
}

impl From<u32> for SeqNum {
    fn from(value: u32) -> Self {
        SeqNum(value)
    }
}

impl From<SeqNum> for u32 {
    fn from(seq: SeqNum) -> Self {
        seq.0
    }
}

impl fmt::Display for SeqNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
