//! Binary and hexadecimal string encodings of fixed-width fields

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};

/// Big-endian bit pattern made of '0'/'1' characters.
///
/// The declared width of a field is the character length of its string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BitString(String);

impl BitString {
    /// Validate and wrap a string of binary digits
    pub fn new(bits: impl Into<String>) -> Result<Self> {
        let bits = bits.into();
        if let Some(c) = bits.chars().find(|c| !matches!(c, '0' | '1')) {
            return Err(CodecError::MalformedToken {
                token: bits,
                reason: format!("unexpected character {c:?} in binary string"),
            });
        }
        Ok(Self(bits))
    }

    /// All-zero pattern of the given width
    pub fn zeros(width: usize) -> Self {
        Self("0".repeat(width))
    }

    /// Low `width` bits of `pattern`
    pub fn from_pattern(pattern: u64, width: u32) -> Self {
        let bits = (0..width)
            .rev()
            .map(|i| if (pattern >> i) & 1 == 1 { '1' } else { '0' })
            .collect();
        Self(bits)
    }

    /// Concatenate fields, first part most significant
    pub fn concat<'a>(parts: impl IntoIterator<Item = &'a BitString>) -> Self {
        Self(parts.into_iter().map(|p| p.as_str()).collect())
    }

    pub fn width(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Left-pad with zero bits up to `width`; never truncates
    pub fn zero_extend(&self, width: usize) -> Result<Self> {
        if width < self.width() {
            return Err(CodecError::TargetWidthTooSmall {
                current: self.width(),
                target: width,
            });
        }
        Ok(Self(format!("{}{}", "0".repeat(width - self.width()), self.0)))
    }

    /// Interpret as an unsigned integer
    pub fn to_unsigned(&self) -> Result<u64> {
        if self.width() > 64 {
            return Err(CodecError::InvalidBitWidth(self.width() as u32));
        }
        Ok(self
            .0
            .bytes()
            .fold(0u64, |acc, b| (acc << 1) | u64::from(b == b'1')))
    }

    /// Interpret as a two's-complement integer
    pub fn to_signed(&self) -> Result<i64> {
        let width = self.width();
        let unsigned = self.to_unsigned()?;
        if width == 0 {
            return Ok(0);
        }
        if unsigned >> (width - 1) & 1 == 1 {
            Ok((unsigned as i128 - (1i128 << width)) as i64)
        } else {
            Ok(unsigned as i64)
        }
    }

    /// Hex rendering, zero-padded on the left to a whole number of nibbles
    pub fn to_hex(&self) -> HexString {
        let pad = (4 - self.width() % 4) % 4;
        let padded = format!("{}{}", "0".repeat(pad), self.0);
        let digits = padded
            .as_bytes()
            .chunks(4)
            .map(|nibble| {
                let v = nibble
                    .iter()
                    .fold(0u32, |acc, &b| (acc << 1) | u32::from(b == b'1'));
                // v < 16 by construction
                char::from_digit(v, 16).unwrap_or('0')
            })
            .collect();
        HexString(digits)
    }
}

impl FromStr for BitString {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for BitString {
    type Error = CodecError;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<BitString> for String {
    fn from(b: BitString) -> Self {
        b.0
    }
}

impl AsRef<str> for BitString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Base-16 rendering of a bit pattern, lowercase, four bits per digit
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexString(String);

impl HexString {
    /// Validate and wrap a string of hex digits (either case accepted, stored lowercase)
    pub fn new(digits: impl Into<String>) -> Result<Self> {
        let digits = digits.into();
        if let Some(c) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(CodecError::MalformedToken {
                token: digits,
                reason: format!("unexpected character {c:?} in hex string"),
            });
        }
        Ok(Self(digits.to_ascii_lowercase()))
    }

    /// Number of hex digits
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Bit width this token represents
    pub fn bit_width(&self) -> usize {
        self.0.len() * 4
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_bits(&self) -> BitString {
        let bits = self
            .0
            .chars()
            .filter_map(|c| c.to_digit(16))
            .map(|v| format!("{v:04b}"))
            .collect();
        BitString(bits)
    }

    /// Value of a one-byte token (exactly two digits)
    pub fn to_byte(&self) -> Result<u8> {
        if self.0.len() != 2 {
            return Err(CodecError::MalformedToken {
                token: self.0.clone(),
                reason: format!("byte token must be 2 hex digits, got {}", self.0.len()),
            });
        }
        let mut byte = [0u8; 1];
        hex::decode_to_slice(&self.0, &mut byte).map_err(|e| CodecError::MalformedToken {
            token: self.0.clone(),
            reason: e.to_string(),
        })?;
        Ok(byte[0])
    }

    pub fn from_byte(byte: u8) -> Self {
        Self(hex::encode([byte]))
    }

    /// One lowercase token per byte
    pub fn from_bytes(bytes: &[u8]) -> Vec<Self> {
        bytes.iter().map(|&b| Self::from_byte(b)).collect()
    }

    pub(crate) fn left_pad(&self, digits: usize) -> Self {
        Self(format!("{}{}", "0".repeat(digits.saturating_sub(self.len())), self.0))
    }
}

impl FromStr for HexString {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for HexString {
    type Error = CodecError;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<HexString> for String {
    fn from(h: HexString) -> Self {
        h.0
    }
}

impl AsRef<str> for HexString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HexString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Convert hex tokens to bit strings, four bits per digit
pub fn hex_to_binary(tokens: &[HexString]) -> Vec<BitString> {
    tokens.iter().map(HexString::to_bits).collect()
}

/// Convert bit strings to hex tokens, left-padding each to a multiple of four bits
pub fn binary_to_hex(bits: &[BitString]) -> Vec<HexString> {
    bits.iter().map(BitString::to_hex).collect()
}

/// Parse raw text tokens as hex strings, rejecting the first malformed one
pub fn parse_hex_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<HexString>> {
    tokens.iter().map(|t| HexString::new(t.as_ref())).collect()
}

/// Parse raw text tokens as bit strings, rejecting the first malformed one
pub fn parse_bit_strings<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<BitString>> {
    tokens.iter().map(|t| BitString::new(t.as_ref())).collect()
}
