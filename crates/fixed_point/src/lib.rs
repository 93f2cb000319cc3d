//! fxpack Fixed-Point Codec
//!
//! Quantizes real values to fixed-point integers, range-checks them against a
//! declared bit width, and lays out binary/hex bit strings for hardware records.

mod assemble;
mod bitstring;
mod codec;
mod error;
mod quantize;

pub use assemble::{
    extend_count, extend_hex_width, extend_width, merge_groups, reverse_groups, split_all,
    split_by_width, uniform_width,
};
pub use bitstring::{
    binary_to_hex, hex_to_binary, parse_bit_strings, parse_hex_tokens, BitString, HexString,
};
pub use codec::{Codec, CodecConfig, RangeReport};
pub use error::{CodecError, Result};
pub use quantize::{
    check_range, quantize, quantize_all, Domain, QuantizedValue, RoundMode, MAX_BIT_WIDTH,
};
