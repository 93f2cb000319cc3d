//! fxpack Bit-Width Configuration
//!
//! Resolves the hierarchical table of hardware bit-width parameters. Entries are
//! literal numbers/arrays or formulas over other entries; formulas are parsed into
//! expression trees and evaluated once, in dependency order, per size variant.

mod error;
mod expr;
mod schema;
mod value;
mod variant;

pub use error::{ConfigError, Result};
pub use expr::{BinOp, Expr, Func};
pub use schema::{merge_tables, ConfigSchema, Key, ResolvedConfig};
pub use value::Value;
pub use variant::{base_table, variant_table, SizeVariant};

/// Merge `overrides` into `base` and resolve every entry
pub fn resolve(
    base: &serde_json::Value,
    overrides: &serde_json::Value,
) -> Result<ResolvedConfig> {
    ConfigSchema::from_tables(base, overrides)?.resolve()
}

/// Resolve the built-in table for one size variant
pub fn resolve_variant(variant: SizeVariant) -> Result<ResolvedConfig> {
    let config = ConfigSchema::for_variant(variant)?.resolve()?;
    tracing::info!(net_size = variant.net_size(), "Resolved bit-width profile");
    Ok(config)
}
