//! Range-checked conversion between integers and fixed-width bit patterns

use serde::{Deserialize, Serialize};

use crate::bitstring::BitString;
use crate::error::{CodecError, Result};
use crate::quantize::{quantize_all, Domain, QuantizedValue, RoundMode};

/// Diagnostic settings for a [`Codec`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Report range violations at warn level instead of debug level
    #[serde(default)]
    pub verbose: bool,
}

impl CodecConfig {
    pub fn verbose() -> Self {
        Self { verbose: true }
    }
}

/// Range violations observed while encoding one array
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeReport {
    /// Values below the domain minimum
    pub below: usize,
    /// Values above the domain maximum
    pub above: usize,
    /// Smallest offending value seen below the minimum
    pub lowest: Option<i64>,
    /// Largest offending value seen above the maximum
    pub highest: Option<i64>,
}

impl RangeReport {
    pub fn is_clean(&self) -> bool {
        self.below == 0 && self.above == 0
    }

    pub fn clamped(&self) -> usize {
        self.below + self.above
    }

    fn record(&mut self, q: &QuantizedValue) {
        if q.below_min() {
            self.below += 1;
            self.lowest = Some(self.lowest.map_or(q.original, |v| v.min(q.original)));
        } else if q.above_max() {
            self.above += 1;
            self.highest = Some(self.highest.map_or(q.original, |v| v.max(q.original)));
        }
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: &RangeReport) {
        self.below += other.below;
        self.above += other.above;
        self.lowest = match (self.lowest, other.lowest) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.highest = match (self.highest, other.highest) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
    }
}

/// Stateless fixed-point encoder; only diagnostics depend on its configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct Codec {
    config: CodecConfig,
}

impl Codec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> CodecConfig {
        self.config
    }

    /// Range-check a single value, reporting a violation under `name`
    pub fn check_range(&self, value: i64, domain: Domain, name: &str) -> QuantizedValue {
        let q = domain.check(value);
        if q.clamped {
            let mut report = RangeReport::default();
            report.record(&q);
            self.emit(&report, domain, name);
        }
        q
    }

    /// Encode integers as `domain.bit_width()`-character two's-complement patterns.
    ///
    /// Out-of-range values are clamped to the nearest bound and reported.
    pub fn to_binary_strings(&self, values: &[i64], domain: Domain, name: &str) -> Vec<BitString> {
        self.to_binary_strings_with_report(values, domain, name).0
    }

    /// Same as [`Codec::to_binary_strings`], also returning the violations found
    pub fn to_binary_strings_with_report(
        &self,
        values: &[i64],
        domain: Domain,
        name: &str,
    ) -> (Vec<BitString>, RangeReport) {
        let width = domain.bit_width();
        let bias = 2i128 * (1i128 << width);
        let mask = (1i128 << width) - 1;

        let mut report = RangeReport::default();
        let bits = values
            .iter()
            .map(|&v| {
                let q = domain.check(v);
                report.record(&q);
                // bias keeps the operand non-negative so masking yields two's complement
                let pattern = (q.raw as i128 + bias) & mask;
                BitString::from_pattern(pattern as u64, width)
            })
            .collect();

        if !report.is_clean() {
            self.emit(&report, domain, name);
        }
        (bits, report)
    }

    /// Decode patterns produced by [`Codec::to_binary_strings`]
    pub fn from_binary_strings(&self, bits: &[BitString], signed: bool) -> Result<Vec<i64>> {
        bits.iter()
            .map(|b| {
                if signed {
                    b.to_signed()
                } else {
                    b.to_unsigned().and_then(|v| {
                        i64::try_from(v)
                            .map_err(|_| CodecError::InvalidBitWidth(b.width() as u32))
                    })
                }
            })
            .collect()
    }

    /// Quantize real values and encode them in one step
    pub fn encode_reals(
        &self,
        values: &[f64],
        mode: RoundMode,
        fractional_bits: u32,
        domain: Domain,
        name: &str,
    ) -> (Vec<BitString>, RangeReport) {
        let ints = quantize_all(values, mode, fractional_bits);
        self.to_binary_strings_with_report(&ints, domain, name)
    }

    fn emit(&self, report: &RangeReport, domain: Domain, name: &str) {
        if let Some(lowest) = report.lowest {
            if self.config.verbose {
                tracing::warn!(
                    param = name,
                    count = report.below,
                    lowest,
                    limit = domain.min(),
                    "data smaller than the lower limit, clamped"
                );
            } else {
                tracing::debug!(
                    param = name,
                    count = report.below,
                    lowest,
                    limit = domain.min(),
                    "data smaller than the lower limit, clamped"
                );
            }
        }
        if let Some(highest) = report.highest {
            if self.config.verbose {
                tracing::warn!(
                    param = name,
                    count = report.above,
                    highest,
                    limit = domain.max(),
                    "data bigger than the upper limit, clamped"
                );
            } else {
                tracing::debug!(
                    param = name,
                    count = report.above,
                    highest,
                    limit = domain.max(),
                    "data bigger than the upper limit, clamped"
                );
            }
        }
    }
}
