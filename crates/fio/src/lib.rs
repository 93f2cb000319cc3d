//! fxpack File I/O
//!
//! Raw byte streams for the accelerator loader, line-oriented text dumps, and
//! name-to-array parameter dictionaries in explicitly selected formats.

mod bin;
mod dict;
mod error;
mod txt;

use std::path::Path;

pub use bin::BinFile;
pub use dict::{DictFormat, DictKind, JsonDict, ParamMap, SafetensorsDict};
pub use error::{FioError, Result};
pub use txt::TxtFile;

/// Create the parent directory of `path` if it does not exist yet
pub(crate) fn create_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
