//! Record layout: how fields become hardware words and bytes
//!
//! Encoding order, per record:
//! 1. quantize and range-check every field (fields run in parallel)
//! 2. pad shorter fields with zero elements
//! 3. concatenate one element of every field into a word, first field most significant
//! 4. zero-extend each word to the word width, rounded up to whole bytes
//! 5. reverse word order inside each group of `group` words
//! 6. split every word into bytes, least significant first

use std::collections::BTreeMap;

use fxpack_config::ResolvedConfig;
use fxpack_fio::ParamMap;
use fxpack_fixed_point::{
    binary_to_hex, extend_count, quantize_all, reverse_groups, split_all, BitString, Codec,
    Domain, HexString, RangeReport, RoundMode,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};
use crate::field::FieldSpec;

const BYTE_BITS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordLayout {
    pub fields: Vec<FieldSpec>,
    /// Config key (or literal) for the word width; defaults to the sum of field widths
    pub word_width_key: Option<String>,
    /// Words per reversal group
    pub group: usize,
    #[serde(default)]
    pub round: RoundMode,
}

/// Hex byte tokens ready for [`fxpack_fio::BinFile`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackedRecord {
    pub tokens: Vec<HexString>,
    /// Elements encoded per field, before group padding
    pub elements: usize,
    /// Words written, including group padding
    pub words: usize,
    /// Bits per word after byte alignment
    pub word_bits: usize,
    pub reports: BTreeMap<String, RangeReport>,
}

impl PackedRecord {
    /// All range violations of the record
    pub fn report(&self) -> RangeReport {
        let mut total = RangeReport::default();
        for report in self.reports.values() {
            total.merge(report);
        }
        total
    }
}

/// A field bound to concrete widths under one configuration
#[derive(Debug, Clone, Copy)]
struct BoundField<'a> {
    spec: &'a FieldSpec,
    domain: Domain,
    fractional_bits: u32,
}

impl RecordLayout {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self {
            fields,
            word_width_key: None,
            group: 1,
            round: RoundMode::Round,
        }
    }

    pub fn with_word_width(mut self, key: impl Into<String>) -> Self {
        self.word_width_key = Some(key.into());
        self
    }

    pub fn with_group(mut self, group: usize) -> Self {
        self.group = group;
        self
    }

    pub fn with_round(mut self, round: RoundMode) -> Self {
        self.round = round;
        self
    }

    fn bind<'a>(&'a self, config: &ResolvedConfig) -> Result<Vec<BoundField<'a>>> {
        if self.fields.is_empty() {
            return Err(HarnessError::InvalidInput(
                "record layout has no fields".to_string(),
            ));
        }
        if self.group == 0 {
            return Err(HarnessError::InvalidInput(
                "group size must be at least 1".to_string(),
            ));
        }
        self.fields
            .iter()
            .map(|spec| {
                Ok(BoundField {
                    spec,
                    domain: spec.domain(config)?,
                    fractional_bits: spec.fractional_bits(config)?,
                })
            })
            .collect()
    }

    /// Byte-aligned word width in bits, checked against the packed field widths
    fn word_bits(&self, config: &ResolvedConfig, fields: &[BoundField<'_>]) -> Result<usize> {
        let packed: usize = fields.iter().map(|f| f.domain.bit_width() as usize).sum();
        let declared = match &self.word_width_key {
            None => packed,
            Some(key) => {
                let width = match key.parse::<usize>() {
                    Ok(literal) => literal,
                    Err(_) => config.nbit(key)? as usize,
                };
                if width < packed {
                    return Err(HarnessError::InvalidInput(format!(
                        "word width {key} = {width} cannot hold {packed} field bits"
                    )));
                }
                width
            }
        };
        Ok(declared.div_ceil(BYTE_BITS) * BYTE_BITS)
    }

    /// Quantize every field of `params` and pack the record
    pub fn encode(
        &self,
        params: &ParamMap,
        config: &ResolvedConfig,
        codec: &Codec,
    ) -> Result<PackedRecord> {
        let fields = self.bind(config)?;
        let word_bits = self.word_bits(config, &fields)?;

        let encoded = fields
            .par_iter()
            .map(|field| {
                let values = params.get(&field.spec.name).ok_or_else(|| {
                    HarnessError::InvalidInput(format!("parameter '{}' not found", field.spec.name))
                })?;
                let ints = quantize_all(values, self.round, field.fractional_bits);
                Ok(codec.to_binary_strings_with_report(&ints, field.domain, &field.spec.name))
            })
            .collect::<Result<Vec<_>>>()?;

        let elements = encoded.iter().map(|(bits, _)| bits.len()).max().unwrap_or(0);
        let mut columns = Vec::with_capacity(encoded.len());
        let mut reports = BTreeMap::new();
        for (field, (bits, report)) in fields.iter().zip(encoded) {
            let column = if bits.is_empty() {
                vec![BitString::zeros(field.domain.bit_width() as usize); elements]
            } else {
                extend_count(&bits, elements)?
            };
            columns.push(column);
            reports.insert(field.spec.name.clone(), report);
        }

        let words = (0..elements)
            .map(|i| BitString::concat(columns.iter().map(|column| &column[i])).zero_extend(word_bits))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let words = reverse_groups(&words, self.group)?;
        let tokens = binary_to_hex(&split_all(&words, BYTE_BITS)?);

        tracing::debug!(
            fields = fields.len(),
            elements,
            words = words.len(),
            word_bits,
            "Packed record"
        );

        Ok(PackedRecord {
            tokens,
            elements,
            words: words.len(),
            word_bits,
            reports,
        })
    }

    /// Recover the first `count` raw integers of every field from packed bytes
    pub fn decode(
        &self,
        bytes: &[u8],
        count: usize,
        config: &ResolvedConfig,
        codec: &Codec,
    ) -> Result<Vec<Vec<i64>>> {
        let fields = self.bind(config)?;
        let word_bits = self.word_bits(config, &fields)?;
        let word_bytes = word_bits / BYTE_BITS;

        if word_bytes == 0 || bytes.len() % word_bytes != 0 {
            return Err(HarnessError::InvalidInput(format!(
                "{} bytes is not a whole number of {word_bytes}-byte words",
                bytes.len()
            )));
        }
        let word_count = bytes.len() / word_bytes;
        if word_count % self.group != 0 {
            return Err(HarnessError::InvalidInput(format!(
                "{word_count} words do not fill groups of {}",
                self.group
            )));
        }
        if count > word_count {
            return Err(HarnessError::InvalidInput(format!(
                "requested {count} elements but the record holds {word_count}"
            )));
        }

        // bytes are stored least significant first within a word
        let words: Vec<BitString> = bytes
            .chunks(word_bytes)
            .map(|chunk| {
                let bytes: Vec<BitString> = chunk
                    .iter()
                    .rev()
                    .map(|&b| HexString::from_byte(b).to_bits())
                    .collect();
                BitString::concat(&bytes)
            })
            .collect();
        let words = reverse_groups(&words, self.group)?;

        let packed: usize = fields.iter().map(|f| f.domain.bit_width() as usize).sum();
        let mut columns: Vec<Vec<BitString>> = vec![Vec::new(); fields.len()];
        for word in words.iter().take(count) {
            let mut offset = word.width() - packed;
            for (column, field) in columns.iter_mut().zip(&fields) {
                let width = field.domain.bit_width() as usize;
                column.push(BitString::new(&word.as_str()[offset..offset + width])?);
                offset += width;
            }
        }

        columns
            .iter()
            .zip(&fields)
            .map(|(column, field)| Ok(codec.from_binary_strings(column, field.domain.is_signed())?))
            .collect()
    }

    /// Raw integers `encode` packs for `params`, after clamping, padded like the record
    pub fn expected(&self, params: &ParamMap, config: &ResolvedConfig) -> Result<Vec<Vec<i64>>> {
        let fields = self.bind(config)?;
        let mut columns = fields
            .iter()
            .map(|field| {
                let values = params.get(&field.spec.name).ok_or_else(|| {
                    HarnessError::InvalidInput(format!("parameter '{}' not found", field.spec.name))
                })?;
                Ok(quantize_all(values, self.round, field.fractional_bits)
                    .into_iter()
                    .map(|v| field.domain.check(v).raw)
                    .collect::<Vec<i64>>())
            })
            .collect::<Result<Vec<_>>>()?;
        let elements = columns.iter().map(Vec::len).max().unwrap_or(0);
        for column in &mut columns {
            column.resize(elements, 0);
        }
        Ok(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxpack_config::{resolve_variant, SizeVariant};

    fn params(entries: &[(&str, &[f64])]) -> ParamMap {
        entries
            .iter()
            .map(|(name, values)| (name.to_string(), values.to_vec()))
            .collect()
    }

    fn tokens(record: &PackedRecord) -> Vec<&str> {
        record.tokens.iter().map(HexString::as_str).collect()
    }

    fn field(spec: &str) -> FieldSpec {
        spec.parse().unwrap()
    }

    #[test]
    fn test_single_signed_field() {
        let config = resolve_variant(SizeVariant::Net128).unwrap();
        let layout = RecordLayout::new(vec![field("w:8:6")]);
        let record = layout
            .encode(&params(&[("w", &[0.1, -0.1, 1.5])]), &config, &Codec::default())
            .unwrap();

        assert_eq!(tokens(&record), ["06", "fa", "60"]);
        assert_eq!(record.word_bits, 8);
        assert!(record.report().is_clean());
    }

    #[test]
    fn test_fields_concatenate_first_most_significant() {
        let config = resolve_variant(SizeVariant::Net128).unwrap();
        let layout = RecordLayout::new(vec![field("a:4:0"), field("b:4:0:u")]);
        let record = layout
            .encode(
                &params(&[("a", &[1.0, 2.0]), ("b", &[3.0])]),
                &config,
                &Codec::default(),
            )
            .unwrap();

        // b is padded with a zero element
        assert_eq!(tokens(&record), ["13", "20"]);
        assert_eq!(record.elements, 2);
    }

    #[test]
    fn test_group_reversal() {
        let config = resolve_variant(SizeVariant::Net128).unwrap();
        let layout = RecordLayout::new(vec![field("a:8:0:u")]).with_group(2);
        let record = layout
            .encode(&params(&[("a", &[1.0, 2.0, 3.0])]), &config, &Codec::default())
            .unwrap();

        assert_eq!(tokens(&record), ["02", "01", "00", "03"]);
        assert_eq!(record.words, 4);
    }

    #[test]
    fn test_multibyte_words_least_significant_first() {
        let config = resolve_variant(SizeVariant::Net128).unwrap();
        let layout = RecordLayout::new(vec![field("x:12:0:u")]);
        let record = layout
            .encode(&params(&[("x", &[291.0])]), &config, &Codec::default())
            .unwrap();

        assert_eq!(record.word_bits, 16);
        assert_eq!(tokens(&record), ["23", "01"]);
    }

    #[test]
    fn test_word_width_from_config() {
        let config = resolve_variant(SizeVariant::Net128).unwrap();
        let layout = RecordLayout::new(vec![field("s:4:0:u")]).with_word_width("NBIT_SEL");
        let record = layout
            .encode(&params(&[("s", &[15.0, 3.0])]), &config, &Codec::default())
            .unwrap();
        assert_eq!(tokens(&record), ["0f", "03"]);

        let narrow = RecordLayout::new(vec![field("s:12:0:u")]).with_word_width("NBIT_SEL");
        assert!(narrow
            .encode(&params(&[("s", &[1.0])]), &config, &Codec::default())
            .is_err());
    }

    #[test]
    fn test_clamped_values_reported() {
        let config = resolve_variant(SizeVariant::Net128).unwrap();
        let layout = RecordLayout::new(vec![field("w:4:0")]);
        let record = layout
            .encode(&params(&[("w", &[100.0, -100.0, 1.0])]), &config, &Codec::default())
            .unwrap();

        assert_eq!(tokens(&record), ["07", "09", "01"]);
        let report = record.report();
        assert_eq!(report.above, 1);
        assert_eq!(report.below, 1);
        assert_eq!(report.highest, Some(100));
    }

    #[test]
    fn test_decode_inverts_encode() {
        let config = resolve_variant(SizeVariant::Net64).unwrap();
        let layout = RecordLayout::new(vec![field("a:5:2"), field("b:11:0:u"), field("c:3:0")])
            .with_group(4);
        let input = params(&[
            ("a", &[1.25, -2.0, 0.5]),
            ("b", &[2047.0, 0.0, 5.0, 9.0, 1.0]),
            ("c", &[-3.0, 3.0]),
        ]);
        let codec = Codec::default();
        let record = layout.encode(&input, &config, &codec).unwrap();
        let bytes: Vec<u8> = record.tokens.iter().map(|t| t.to_byte().unwrap()).collect();

        let decoded = layout.decode(&bytes, record.elements, &config, &codec).unwrap();
        assert_eq!(decoded, layout.expected(&input, &config).unwrap());
        assert_eq!(decoded[0], [5, -8, 2, 0, 0]);
        assert_eq!(decoded[1], [2047, 0, 5, 9, 1]);
    }

    #[test]
    fn test_decode_rejects_partial_words() {
        let config = resolve_variant(SizeVariant::Net128).unwrap();
        let layout = RecordLayout::new(vec![field("x:12:0:u")]);
        assert!(layout.decode(&[1, 2, 3], 1, &config, &Codec::default()).is_err());
        assert!(layout.decode(&[1, 2], 2, &config, &Codec::default()).is_err());
    }

    #[test]
    fn test_round_mode() {
        let config = resolve_variant(SizeVariant::Net128).unwrap();
        let input = params(&[("w", &[0.3, -0.3])]);
        let floor = RecordLayout::new(vec![field("w:8:1")]).with_round(RoundMode::Floor);
        let record = floor.encode(&input, &config, &Codec::default()).unwrap();
        assert_eq!(tokens(&record), ["00", "ff"]);

        let ceil = RecordLayout::new(vec![field("w:8:1")]).with_round(RoundMode::Ceil);
        let record = ceil.encode(&input, &config, &Codec::default()).unwrap();
        assert_eq!(tokens(&record), ["01", "00"]);
    }

    #[test]
    fn test_missing_parameter() {
        let config = resolve_variant(SizeVariant::Net128).unwrap();
        let layout = RecordLayout::new(vec![field("w:8:0")]);
        let err = layout
            .encode(&ParamMap::new(), &config, &Codec::default())
            .unwrap_err();
        assert!(matches!(err, HarnessError::InvalidInput(_)));
    }
}
