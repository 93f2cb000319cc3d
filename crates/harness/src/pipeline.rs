//! End-to-end pipeline: parameters in, loader-ready record files out

use std::path::{Path, PathBuf};

use fxpack_config::{resolve_variant, ResolvedConfig, SizeVariant};
use fxpack_fio::{BinFile, ParamMap, TxtFile};
use fxpack_fixed_point::{Codec, CodecConfig, HexString, RangeReport};
use serde::Serialize;

use crate::error::{HarnessError, Result};
use crate::layout::{PackedRecord, RecordLayout};

/// Pipeline settings
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Hardware size variant whose bit widths are used
    pub size: SizeVariant,

    /// Directory the record files are written to
    pub output_dir: PathBuf,

    /// Base name of the written files
    pub name: String,

    /// Report clamped values at warn level
    pub debug: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            size: SizeVariant::Net128,
            output_dir: PathBuf::from("out"),
            name: "record".to_string(),
            debug: false,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(size) = std::env::var("FXPACK_NET_SIZE") {
            if let Ok(s) = size.parse() {
                config.size = s;
            }
        }

        if let Ok(dir) = std::env::var("FXPACK_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }

        if let Ok(debug) = std::env::var("FXPACK_DEBUG") {
            config.debug = matches!(debug.as_str(), "1" | "true" | "yes");
        }

        config
    }

    pub fn codec_config(&self) -> CodecConfig {
        CodecConfig {
            verbose: self.debug,
        }
    }
}

/// Outcome of one [`Pipeline::run`]
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub bin_path: PathBuf,
    pub txt_path: PathBuf,
    pub tokens: usize,
    pub elements: usize,
    pub words: usize,
    pub report: RangeReport,
}

/// Resolved bit widths, codec and record layout
pub struct Pipeline {
    config: ResolvedConfig,
    codec: Codec,
    layout: RecordLayout,
    name: String,
}

impl Pipeline {
    /// Resolve the built-in profile named by `settings`
    pub fn new(settings: &PipelineConfig, layout: RecordLayout) -> Result<Self> {
        let config = resolve_variant(settings.size)?;
        Ok(Self::with_config(
            config,
            Codec::new(settings.codec_config()),
            layout,
            settings.name.clone(),
        ))
    }

    /// Use an already resolved configuration
    pub fn with_config(
        config: ResolvedConfig,
        codec: Codec,
        layout: RecordLayout,
        name: impl Into<String>,
    ) -> Self {
        Self {
            config,
            codec,
            layout,
            name: name.into(),
        }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    pub fn encode(&self, params: &ParamMap) -> Result<PackedRecord> {
        self.layout.encode(params, &self.config, &self.codec)
    }

    /// Encode `params` and write `<name>.bin` plus a `<name>.txt` hex dump into `out_dir`
    pub fn run(&self, params: &ParamMap, out_dir: &Path) -> Result<RunSummary> {
        let record = self.encode(params)?;
        let bin_path = out_dir.join(format!("{}.bin", self.name));
        let txt_path = out_dir.join(format!("{}.txt", self.name));

        BinFile::save(&bin_path, &record.tokens)?;
        let lines: Vec<&str> = record.tokens.iter().map(HexString::as_str).collect();
        TxtFile::save(&txt_path, &lines)?;

        let report = record.report();
        if !report.is_clean() {
            tracing::warn!(
                name = %self.name,
                clamped = report.clamped(),
                "Record contains clamped values"
            );
        }
        tracing::info!(
            path = %bin_path.display(),
            tokens = record.tokens.len(),
            words = record.words,
            "Record written"
        );

        Ok(RunSummary {
            bin_path,
            txt_path,
            tokens: record.tokens.len(),
            elements: record.elements,
            words: record.words,
            report,
        })
    }

    /// Decode a written record and compare it with what `params` should produce
    pub fn verify(&self, params: &ParamMap, bin_path: &Path) -> Result<()> {
        let expected = self.layout.expected(params, &self.config)?;
        let count = expected.first().map_or(0, Vec::len);
        let bytes = BinFile::load(bin_path)?;
        let decoded = self
            .layout
            .decode(&bytes, count, &self.config, &self.codec)?;

        for ((field, want), got) in self.layout.fields.iter().zip(&expected).zip(&decoded) {
            if let Some(index) = want.iter().zip(got).position(|(a, b)| a != b) {
                return Err(HarnessError::VerificationFailed {
                    message: format!(
                        "field {} element {index}: expected {}, read {}",
                        field.name, want[index], got[index]
                    ),
                });
            }
        }
        tracing::info!(path = %bin_path.display(), elements = count, "Record verified");
        Ok(())
    }
}
