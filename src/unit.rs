//! Utilities for working with sizes and raw byte units.

use core::fmt;

/// `1 KiB`
pub const KIB: usize = 1 << 10;
/// `1 MiB`
pub const MIB: usize = 1 << 20;
/// `1 GiB`
pub const GIB: usize = 1 << 30;
/// `1 TiB`
pub const TIB: usize = 1 << 40;

/// Returns the smallest power of two that is greater than or equal to `n`.
///
/// `0` is rounded to `1`. Returns `None` if the result would not fit
/// into a `usize`.
pub fn round_up_pow2(n: usize) -> Option<usize> {
    n.checked_next_power_of_two()
}

/// Returns whether `n` is a non-zero power of two.
pub fn is_power_of_two(n: usize) -> bool {
    n != 0 && n & (n - 1) == 0
}

/// Wrapper around raw byte that pretty-prints
/// them using the [`Display`](core::fmt::Display)
/// implementation.
#[derive(Debug, Clone, Copy)]
pub struct ByteUnit(pub usize);

impl fmt::Display for ByteUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.0 as f64;

        if self.0 < KIB {
            write!(f, "{} B", self.0)
        } else if self.0 < MIB {
            write!(f, "{:.2} KiB", count / KIB as f64)
        } else if self.0 < GIB {
            write!(f, "{:.2} MiB", count / MIB as f64)
        } else if self.0 < TIB {
            write!(f, "{:.2} GiB", count / GIB as f64)
        } else {
            write!(f, "{:.2} TiB", count / TIB as f64)
        }
    }
}

/// Shorthand for wrapping a byte count into a [`ByteUnit`].
pub fn bytes(count: usize) -> ByteUnit {
    ByteUnit(count)
}
