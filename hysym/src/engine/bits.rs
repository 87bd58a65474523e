//! Bit-precise arithmetic on numerals of at most [`MAX_WIDTH`](super::MAX_WIDTH) bits.
//!
//! Values are unsigned bit patterns held in a `u128`; every function returns a pattern
//! masked to the requested width. Division by zero follows the SMT-LIB conventions.

#[inline]
pub fn mask(width: u32) -> u128 {
    if width >= 128 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    }
}

/// Interpret the `width`-bit pattern `value` as a two's complement integer.
#[inline]
pub fn to_signed(value: u128, width: u32) -> i128 {
    if width >= 128 {
        value as i128
    } else if (value >> (width - 1)) & 1 == 1 {
        (value as i128) - (1i128 << width)
    } else {
        value as i128
    }
}

#[inline]
pub fn from_signed(value: i128, width: u32) -> u128 {
    (value as u128) & mask(width)
}

pub fn neg(a: u128, width: u32) -> u128 {
    a.wrapping_neg() & mask(width)
}

pub fn not(a: u128, width: u32) -> u128 {
    !a & mask(width)
}

pub fn add(a: u128, b: u128, width: u32) -> u128 {
    a.wrapping_add(b) & mask(width)
}

pub fn sub(a: u128, b: u128, width: u32) -> u128 {
    a.wrapping_sub(b) & mask(width)
}

pub fn mul(a: u128, b: u128, width: u32) -> u128 {
    a.wrapping_mul(b) & mask(width)
}

pub fn udiv(a: u128, b: u128, width: u32) -> u128 {
    if b == 0 { mask(width) } else { a / b }
}

pub fn urem(a: u128, b: u128, _width: u32) -> u128 {
    if b == 0 { a } else { a % b }
}

pub fn sdiv(a: u128, b: u128, width: u32) -> u128 {
    let (sa, sb) = (to_signed(a, width), to_signed(b, width));
    if sb == 0 {
        if sa < 0 { 1 } else { mask(width) }
    } else {
        from_signed(sa.wrapping_div(sb), width)
    }
}

/// Signed remainder, the sign follows the dividend.
pub fn srem(a: u128, b: u128, width: u32) -> u128 {
    let (sa, sb) = (to_signed(a, width), to_signed(b, width));
    if sb == 0 {
        a
    } else {
        from_signed(sa.wrapping_rem(sb), width)
    }
}

pub fn shl(a: u128, b: u128, width: u32) -> u128 {
    if b >= width as u128 {
        0
    } else {
        (a << b) & mask(width)
    }
}

pub fn lshr(a: u128, b: u128, width: u32) -> u128 {
    if b >= width as u128 { 0 } else { a >> b }
}

pub fn ult(a: u128, b: u128, _width: u32) -> bool {
    a < b
}

pub fn slt(a: u128, b: u128, width: u32) -> bool {
    to_signed(a, width) < to_signed(b, width)
}

pub fn extract(a: u128, hi: u32, lo: u32) -> u128 {
    (a >> lo) & mask(hi - lo + 1)
}

/// Concatenate `a` (most significant) with the `low_width`-bit pattern `b`.
pub fn concat(a: u128, b: u128, low_width: u32) -> u128 {
    if low_width >= 128 { b } else { (a << low_width) | b }
}

pub fn sign_extend(a: u128, width: u32, by: u32) -> u128 {
    from_signed(to_signed(a, width), width + by)
}
