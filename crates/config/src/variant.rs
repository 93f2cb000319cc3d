//! Built-in base table and hardware size variants

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

const BASE_TABLE: &str = include_str!("../data/base.json");
const VARIANT_TABLES: &str = include_str!("../data/variants.json");

/// Fitting-network width the accelerator is built for
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum SizeVariant {
    Net16,
    Net32,
    Net64,
    #[default]
    Net128,
}

impl SizeVariant {
    pub const ALL: [SizeVariant; 4] = [
        SizeVariant::Net16,
        SizeVariant::Net32,
        SizeVariant::Net64,
        SizeVariant::Net128,
    ];

    /// Key of this variant in the override table
    pub fn key(self) -> &'static str {
        match self {
            SizeVariant::Net16 => "_16",
            SizeVariant::Net32 => "_32",
            SizeVariant::Net64 => "_64",
            SizeVariant::Net128 => "128",
        }
    }

    pub fn net_size(self) -> u32 {
        match self {
            SizeVariant::Net16 => 16,
            SizeVariant::Net32 => 32,
            SizeVariant::Net64 => 64,
            SizeVariant::Net128 => 128,
        }
    }

    pub fn from_net_size(size: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.net_size() == size)
    }
}

impl FromStr for SizeVariant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_start_matches('_');
        trimmed
            .parse::<u32>()
            .ok()
            .and_then(Self::from_net_size)
            .ok_or_else(|| ConfigError::UnknownVariant(s.to_string()))
    }
}

impl fmt::Display for SizeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.net_size())
    }
}

/// The built-in base table
pub fn base_table() -> Result<serde_json::Value> {
    Ok(serde_json::from_str(BASE_TABLE)?)
}

/// The built-in override fragment for `variant`
pub fn variant_table(variant: SizeVariant) -> Result<serde_json::Value> {
    let mut all: serde_json::Value = serde_json::from_str(VARIANT_TABLES)?;
    all.get_mut(variant.key())
        .map(serde_json::Value::take)
        .ok_or_else(|| ConfigError::UnknownVariant(variant.key().to_string()))
}
