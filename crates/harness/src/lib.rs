//! fxpack Record Harness
//!
//! Ties the workspace together: resolve a bit-width profile, quantize named
//! parameter arrays into fixed-width fields, pack them into the byte layout the
//! accelerator loader expects, and write or verify the resulting record.

mod error;
mod field;
mod layout;
mod pipeline;

pub use error::{HarnessError, Result};
pub use field::FieldSpec;
pub use layout::{PackedRecord, RecordLayout};
pub use pipeline::{Pipeline, PipelineConfig, RunSummary};
