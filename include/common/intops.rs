//! Integer helpers shared by the grain kernels.

use std::cmp;

#[inline]
pub fn iclip(v: i32, min: i32, max: i32) -> i32 {
    cmp::max(min, cmp::min(v, max))
}

/// Rounding right shift. `shift == 0` returns `x` unchanged.
#[inline]
pub fn round2(x: i32, shift: u8) -> i32 {
    if shift == 0 {
        return x;
    }
    (x + (1 << (shift - 1))) >> shift
}

#[inline]
pub const fn bitdepth_from_max(bitdepth_max: i32) -> u8 {
    (32 - bitdepth_max.leading_zeros()) as u8
}
