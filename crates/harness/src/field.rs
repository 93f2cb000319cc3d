//! Named parameter fields and their bit-width bindings

use std::fmt;
use std::str::FromStr;

use fxpack_config::ResolvedConfig;
use fxpack_fixed_point::Domain;
use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};

/// One parameter array packed into every record word.
///
/// Widths are config keys (`NBIT_WEIGHT`) or literal bit counts (`8`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Parameter name in the dictionary
    pub name: String,
    /// Total bit width of one element
    pub width_key: String,
    /// Fractional bits used when quantizing
    pub frac_key: String,
    pub signed: bool,
}

impl FieldSpec {
    pub fn new(
        name: impl Into<String>,
        width_key: impl Into<String>,
        frac_key: impl Into<String>,
        signed: bool,
    ) -> Self {
        Self {
            name: name.into(),
            width_key: width_key.into(),
            frac_key: frac_key.into(),
            signed,
        }
    }

    /// Encoding domain under `config`
    pub fn domain(&self, config: &ResolvedConfig) -> Result<Domain> {
        let width = bit_count(config, &self.width_key)?;
        Ok(Domain::new(width, self.signed)?)
    }

    pub fn fractional_bits(&self, config: &ResolvedConfig) -> Result<u32> {
        bit_count(config, &self.frac_key)
    }
}

fn bit_count(config: &ResolvedConfig, key: &str) -> Result<u32> {
    match key.parse::<u32>() {
        Ok(literal) => Ok(literal),
        Err(_) => Ok(config.nbit(key)?),
    }
}

impl FromStr for FieldSpec {
    type Err = HarnessError;

    /// Parse `name:WIDTH_KEY:FRAC_KEY[:u]`
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        let signed = match parts.get(3) {
            None => true,
            Some(&"u") => false,
            Some(&"s") => true,
            Some(other) => {
                return Err(HarnessError::InvalidInput(format!(
                    "field '{s}': unknown sign flag '{other}'"
                )))
            }
        };
        match parts.as_slice() {
            [name, width, frac] | [name, width, frac, _]
                if !name.is_empty() && !width.is_empty() && !frac.is_empty() =>
            {
                Ok(Self::new(*name, *width, *frac, signed))
            }
            _ => Err(HarnessError::InvalidInput(format!(
                "field '{s}': expected name:WIDTH_KEY:FRAC_KEY[:u]"
            ))),
        }
    }
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.name, self.width_key, self.frac_key)?;
        if !self.signed {
            f.write_str(":u")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxpack_config::{resolve_variant, SizeVariant};

    #[test]
    fn test_parse_field() {
        let field: FieldSpec = "fitn.w0:NBIT_FITN:NBIT_FLTF".parse().unwrap();
        assert_eq!(field, FieldSpec::new("fitn.w0", "NBIT_FITN", "NBIT_FLTF", true));

        let field: FieldSpec = "sel:NBIT_SEL:0:u".parse().unwrap();
        assert!(!field.signed);
        assert_eq!(field.to_string(), "sel:NBIT_SEL:0:u");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("w0:8".parse::<FieldSpec>().is_err());
        assert!("w0:8:6:x".parse::<FieldSpec>().is_err());
        assert!(":8:6".parse::<FieldSpec>().is_err());
        assert!("w0:8:6:u:extra".parse::<FieldSpec>().is_err());
    }

    #[test]
    fn test_bind_to_config() {
        let config = resolve_variant(SizeVariant::Net128).unwrap();
        let field: FieldSpec = "sel:NBIT_SEL:0:u".parse().unwrap();
        let domain = field.domain(&config).unwrap();
        assert_eq!(domain.bit_width(), 8);
        assert_eq!(domain.max(), 255);
        assert_eq!(field.fractional_bits(&config).unwrap(), 0);

        let literal: FieldSpec = "w:8:6".parse().unwrap();
        assert_eq!(literal.domain(&config).unwrap().max(), 127);
        assert_eq!(literal.fractional_bits(&config).unwrap(), 6);
    }

    #[test]
    fn test_unknown_key() {
        let config = resolve_variant(SizeVariant::Net16).unwrap();
        let field: FieldSpec = "w:NBIT_NOPE:0".parse().unwrap();
        assert!(matches!(
            field.domain(&config),
            Err(HarnessError::Config(_))
        ));
    }
}
