//! Bit-string list primitives for laying out composite hardware records
//!
//! All functions are pure. Lists whose length is not a multiple of the group size
//! are padded with all-zero elements before grouping.

use crate::bitstring::{BitString, HexString};
use crate::error::{CodecError, Result};

/// Common width of all elements, or an error naming the first outlier
pub fn uniform_width(list: &[BitString]) -> Result<usize> {
    let Some(first) = list.first() else {
        return Err(CodecError::EmptyList);
    };
    let expected = first.width();
    match list.iter().position(|b| b.width() != expected) {
        Some(index) => Err(CodecError::WidthMismatch {
            expected,
            got: list[index].width(),
            index,
        }),
        None => Ok(expected),
    }
}

/// Append all-zero elements until `list` holds `target_count` elements.
///
/// `extend_count(["10010", "10100"], 4)` gives `["10010", "10100", "00000", "00000"]`.
pub fn extend_count(list: &[BitString], target_count: usize) -> Result<Vec<BitString>> {
    if target_count < list.len() {
        return Err(CodecError::TargetCountTooSmall {
            current: list.len(),
            target: target_count,
        });
    }
    if list.is_empty() {
        return if target_count == 0 {
            Ok(Vec::new())
        } else {
            Err(CodecError::EmptyList)
        };
    }

    let width = uniform_width(list)?;
    let mut out = Vec::with_capacity(target_count);
    out.extend_from_slice(list);
    out.resize(target_count, BitString::zeros(width));
    Ok(out)
}

/// Left-pad every element with zero bits to `target_width`.
///
/// `extend_width(["10010", "10100"], 6)` gives `["010010", "010100"]`.
pub fn extend_width(list: &[BitString], target_width: usize) -> Result<Vec<BitString>> {
    if list.is_empty() {
        return Ok(Vec::new());
    }
    uniform_width(list)?;
    list.iter().map(|b| b.zero_extend(target_width)).collect()
}

/// Left-pad every hex token to `target_bits / 4` digits
pub fn extend_hex_width(list: &[HexString], target_bits: usize) -> Result<Vec<HexString>> {
    let Some(first) = list.first() else {
        return Ok(Vec::new());
    };
    let digits = target_bits / 4;
    let current = first.len();
    if let Some(index) = list.iter().position(|h| h.len() != current) {
        return Err(CodecError::WidthMismatch {
            expected: current * 4,
            got: list[index].bit_width(),
            index,
        });
    }
    if digits < current {
        return Err(CodecError::TargetWidthTooSmall {
            current: current * 4,
            target: target_bits,
        });
    }
    Ok(list.iter().map(|h| h.left_pad(digits)).collect())
}

/// Split `bits` into `segment_width`-bit segments, least significant segment first.
///
/// The most significant segment is zero-padded on the left when the width is not a
/// multiple of `segment_width`.
pub fn split_by_width(bits: &BitString, segment_width: usize) -> Result<Vec<BitString>> {
    if segment_width == 0 {
        return Err(CodecError::ZeroSize {
            what: "segment width",
        });
    }
    let segments = bits.width().div_ceil(segment_width);
    let padded = bits.zero_extend(segments * segment_width)?;
    let mut out: Vec<BitString> = padded
        .as_str()
        .as_bytes()
        .chunks(segment_width)
        .map(|chunk| BitString::new(String::from_utf8_lossy(chunk).into_owned()))
        .collect::<Result<_>>()?;
    out.reverse();
    Ok(out)
}

/// Split every element and concatenate the segment lists in element order
pub fn split_all(list: &[BitString], segment_width: usize) -> Result<Vec<BitString>> {
    let mut out = Vec::new();
    for bits in list {
        out.extend(split_by_width(bits, segment_width)?);
    }
    Ok(out)
}

fn pad_to_group(list: &[BitString], group_size: usize) -> Result<Vec<BitString>> {
    if group_size == 0 {
        return Err(CodecError::ZeroSize { what: "group size" });
    }
    if list.len() % group_size == 0 {
        return Ok(list.to_vec());
    }
    extend_count(list, list.len().div_ceil(group_size) * group_size)
}

/// Reverse element order inside each consecutive group of `group_size`.
///
/// `reverse_groups(["00", "01", "10", "11"], 2)` gives `["01", "00", "11", "10"]`.
pub fn reverse_groups(list: &[BitString], group_size: usize) -> Result<Vec<BitString>> {
    let padded = pad_to_group(list, group_size)?;
    Ok(padded
        .chunks(group_size)
        .flat_map(|group| group.iter().rev().cloned())
        .collect())
}

/// Concatenate each consecutive group of `group_size` elements into one wider element
pub fn merge_groups(list: &[BitString], group_size: usize) -> Result<Vec<BitString>> {
    let padded = pad_to_group(list, group_size)?;
    Ok(padded.chunks(group_size).map(BitString::concat).collect())
}
