//! Fixed-point scaling and range domains

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};

/// Widest field the codec handles (all arithmetic stays within 64-bit integers)
pub const MAX_BIT_WIDTH: u32 = 63;

/// Rounding policy applied after scaling by 2^fractional_bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundMode {
    /// Nearest integer, ties to even
    #[default]
    Round,
    /// Toward negative infinity
    Floor,
    /// Toward positive infinity
    Ceil,
}

impl RoundMode {
    fn apply(self, scaled: f64) -> f64 {
        match self {
            RoundMode::Round => scaled.round_ties_even(),
            RoundMode::Floor => scaled.floor(),
            RoundMode::Ceil => scaled.ceil(),
        }
    }
}

impl FromStr for RoundMode {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "round" => Ok(RoundMode::Round),
            "floor" => Ok(RoundMode::Floor),
            "ceil" => Ok(RoundMode::Ceil),
            other => Err(CodecError::MalformedToken {
                token: other.to_string(),
                reason: "expected one of round, floor, ceil".to_string(),
            }),
        }
    }
}

impl fmt::Display for RoundMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoundMode::Round => "round",
            RoundMode::Floor => "floor",
            RoundMode::Ceil => "ceil",
        };
        f.write_str(name)
    }
}

/// Scale `value` by 2^fractional_bits and round to an integer.
///
/// No clamping happens here. Values beyond the i64 range saturate and NaN maps to 0,
/// following `as` cast semantics; the range check downstream clamps them into the domain.
pub fn quantize(value: f64, mode: RoundMode, fractional_bits: u32) -> i64 {
    let scale_factor = 2f64.powi(fractional_bits as i32);
    mode.apply(value * scale_factor) as i64
}

/// Quantize a slice of values with a common mode and fractional-bit position
pub fn quantize_all(values: &[f64], mode: RoundMode, fractional_bits: u32) -> Vec<i64> {
    values
        .iter()
        .map(|&v| quantize(v, mode, fractional_bits))
        .collect()
}

/// Legal integer range of a field with the given width and signedness.
///
/// The signed range is symmetric: `[-(2^(b-1) - 1), 2^(b-1) - 1]`. The most negative
/// two's-complement pattern is never produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Domain {
    bit_width: u32,
    signed: bool,
}

impl Domain {
    pub fn new(bit_width: u32, signed: bool) -> Result<Self> {
        if bit_width == 0 || bit_width > MAX_BIT_WIDTH {
            return Err(CodecError::InvalidBitWidth(bit_width));
        }
        Ok(Self { bit_width, signed })
    }

    pub fn unsigned(bit_width: u32) -> Result<Self> {
        Self::new(bit_width, false)
    }

    pub fn signed(bit_width: u32) -> Result<Self> {
        Self::new(bit_width, true)
    }

    pub fn bit_width(&self) -> u32 {
        self.bit_width
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    /// Largest legal value
    pub fn max(&self) -> i64 {
        if self.signed {
            (1i64 << (self.bit_width - 1)) - 1
        } else {
            ((1i128 << self.bit_width) - 1) as i64
        }
    }

    /// Smallest legal value
    pub fn min(&self) -> i64 {
        if self.signed {
            -self.max()
        } else {
            0
        }
    }

    pub fn contains(&self, value: i64) -> bool {
        (self.min()..=self.max()).contains(&value)
    }

    /// Range-check `value`, clamping it to the nearest bound when outside
    pub fn check(&self, value: i64) -> QuantizedValue {
        let (min, max) = (self.min(), self.max());
        let raw = value.clamp(min, max);
        QuantizedValue {
            raw,
            original: value,
            min,
            max,
            clamped: raw != value,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.signed { "signed" } else { "unsigned" };
        write!(f, "{}-bit {} [{}, {}]", self.bit_width, kind, self.min(), self.max())
    }
}

/// Result of range-checking one integer against a [`Domain`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantizedValue {
    /// Stored value, always within [min, max]
    pub raw: i64,
    /// Value before clamping
    pub original: i64,
    pub min: i64,
    pub max: i64,
    /// Whether `original` fell outside the domain
    pub clamped: bool,
}

impl QuantizedValue {
    pub fn in_range(&self) -> bool {
        !self.clamped
    }

    pub fn below_min(&self) -> bool {
        self.original < self.min
    }

    pub fn above_max(&self) -> bool {
        self.original > self.max
    }
}

/// Check `value` against a `bit_width`/`signed` domain, returning the clamped result
pub fn check_range(value: i64, bit_width: u32, signed: bool) -> Result<QuantizedValue> {
    Ok(Domain::new(bit_width, signed)?.check(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_modes() {
        assert_eq!(quantize(0.1, RoundMode::Round, 6), 6);
        assert_eq!(quantize(-0.1, RoundMode::Round, 6), -6);
        assert_eq!(quantize(0.1, RoundMode::Floor, 6), 6);
        assert_eq!(quantize(0.1, RoundMode::Ceil, 6), 7);
        assert_eq!(quantize(-0.1, RoundMode::Floor, 6), -7);
        assert_eq!(quantize(-0.1, RoundMode::Ceil, 6), -6);
        assert_eq!(quantize(1.5, RoundMode::Round, 6), 96);
    }

    #[test]
    fn test_round_ties_to_even() {
        assert_eq!(quantize(2.5, RoundMode::Round, 0), 2);
        assert_eq!(quantize(3.5, RoundMode::Round, 0), 4);
        assert_eq!(quantize(-2.5, RoundMode::Round, 0), -2);
        // 0.5 / 64 scaled by 2^6 is exactly 0.5
        assert_eq!(quantize(0.5 / 64.0, RoundMode::Round, 6), 0);
    }

    #[test]
    fn test_quantize_saturates() {
        assert_eq!(quantize(f64::INFINITY, RoundMode::Round, 4), i64::MAX);
        assert_eq!(quantize(f64::NAN, RoundMode::Round, 4), 0);
    }

    #[test]
    fn test_unsigned_domain() {
        let d = Domain::unsigned(4).unwrap();
        assert_eq!((d.min(), d.max()), (0, 15));

        let q = d.check(20);
        assert_eq!(q.raw, 15);
        assert!(q.clamped && q.above_max());

        let q = d.check(-3);
        assert_eq!(q.raw, 0);
        assert!(q.below_min());

        assert!(d.check(7).in_range());
    }

    #[test]
    fn test_signed_domain_is_symmetric() {
        let d = Domain::signed(8).unwrap();
        assert_eq!(d.max(), 127);
        assert_eq!(d.min(), -127);
        assert!(!d.contains(-128));
        assert_eq!(d.check(-128).raw, -127);
    }

    #[test]
    fn test_widest_domain() {
        let d = Domain::unsigned(MAX_BIT_WIDTH).unwrap();
        assert_eq!(d.max(), i64::MAX);
        let d = Domain::signed(MAX_BIT_WIDTH).unwrap();
        assert_eq!(d.min(), -((1i64 << 62) - 1));
    }

    #[test]
    fn test_invalid_width() {
        assert_eq!(Domain::new(0, false), Err(CodecError::InvalidBitWidth(0)));
        assert_eq!(Domain::new(64, true), Err(CodecError::InvalidBitWidth(64)));
        assert!(check_range(1, 65, false).is_err());
    }

    #[test]
    fn test_round_mode_parse() {
        assert_eq!("floor".parse::<RoundMode>().unwrap(), RoundMode::Floor);
        assert_eq!(RoundMode::Ceil.to_string(), "ceil");
        assert!("truncate".parse::<RoundMode>().is_err());
    }
}
