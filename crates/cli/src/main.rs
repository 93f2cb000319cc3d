//! fxpack CLI
//!
//! Resolve bit-width profiles and pack trained parameters into accelerator records.
//!
//! # Usage
//!
//! ```bash
//! # Print the resolved 64-wide profile
//! fxpack resolve --size 64
//!
//! # Pack two fields of a parameter dictionary
//! fxpack encode --params fitn.json --field w0:NBIT_FITN:NBIT_FITN_FL --field s0:NBIT_SEL:0:u \
//!     --size 128 --output out --name fitn
//!
//! # Show a written record
//! fxpack dump --input out/fitn.bin
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fxpack_config::{base_table, variant_table, ConfigSchema, SizeVariant};
use fxpack_fio::{BinFile, DictKind};
use fxpack_fixed_point::RoundMode;
use fxpack_harness::{FieldSpec, Pipeline, PipelineConfig, RecordLayout};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fxpack")]
#[command(version)]
#[command(about = "Fixed-point quantization and bit packing for accelerator parameter records")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a bit-width profile and print it as JSON
    Resolve {
        /// Fitting-network width: 16, 32, 64 or 128
        #[arg(short, long, default_value_t = 128)]
        size: u32,

        /// Base table (defaults to the built-in table)
        #[arg(long)]
        base: Option<PathBuf>,

        /// Override table (defaults to the built-in fragment for --size)
        #[arg(long = "override")]
        overrides: Option<PathBuf>,

        /// Write the JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Quantize a parameter dictionary and write a packed record
    Encode {
        /// Parameter dictionary
        #[arg(short, long)]
        params: PathBuf,

        /// Dictionary format: json or safetensors
        #[arg(long, default_value = "json")]
        format: DictKind,

        /// Field as name:WIDTH_KEY:FRAC_KEY[:u], most significant first
        #[arg(long = "field", required = true)]
        fields: Vec<FieldSpec>,

        /// Config key or literal for the word width
        #[arg(long)]
        word_width: Option<String>,

        /// Words per reversal group
        #[arg(long, default_value_t = 1)]
        group: usize,

        /// Rounding mode: round, floor or ceil
        #[arg(long, default_value = "round")]
        round: RoundMode,

        /// Fitting-network width (overrides FXPACK_NET_SIZE)
        #[arg(short, long)]
        size: Option<u32>,

        /// Output directory (overrides FXPACK_OUTPUT_DIR)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Base name of the written files
        #[arg(long)]
        name: Option<String>,

        /// Report clamped values as warnings
        #[arg(long)]
        debug: bool,

        /// Read the record back and check it
        #[arg(long)]
        verify: bool,
    },

    /// Print the bytes of a binary record as hex tokens
    Dump {
        #[arg(short, long)]
        input: PathBuf,

        /// Tokens per output line
        #[arg(long, default_value_t = 1)]
        per_line: usize,
    },
}

fn size_variant(size: u32) -> Result<SizeVariant> {
    match SizeVariant::from_net_size(size) {
        Some(variant) => Ok(variant),
        None => bail!("unsupported network size {size}, expected 16, 32, 64 or 128"),
    }
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn resolve(
    size: u32,
    base: Option<&Path>,
    overrides: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let variant = size_variant(size)?;
    let base = match base {
        Some(path) => read_json(path)?,
        None => base_table()?,
    };
    let overrides = match overrides {
        Some(path) => read_json(path)?,
        None => variant_table(variant)?,
    };

    let schema = ConfigSchema::from_tables(&base, &overrides)?;
    let config = schema.resolve()?;
    tracing::info!(entries = schema.len(), net_size = size, "Resolved configuration");

    let json = config.to_json_pretty()?;
    match output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), "Configuration written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn dump(input: &Path, per_line: usize) -> Result<()> {
    if per_line == 0 {
        bail!("--per-line must be at least 1");
    }
    let tokens = BinFile::load_tokens(input)?;
    for line in tokens.chunks(per_line) {
        let text: Vec<&str> = line.iter().map(|t| t.as_str()).collect();
        println!("{}", text.join(" "));
    }
    tracing::info!(bytes = tokens.len(), "Dumped record");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fxpack=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Resolve {
            size,
            base,
            overrides,
            output,
        } => resolve(size, base.as_deref(), overrides.as_deref(), output.as_deref()),

        Commands::Encode {
            params,
            format,
            fields,
            word_width,
            group,
            round,
            size,
            output,
            name,
            debug,
            verify,
        } => {
            let mut settings = PipelineConfig::from_env();
            if let Some(size) = size {
                settings.size = size_variant(size)?;
            }
            if let Some(output) = output {
                settings.output_dir = output;
            }
            if let Some(name) = name {
                settings.name = name;
            }
            settings.debug |= debug;

            let mut layout = RecordLayout::new(fields).with_group(group).with_round(round);
            if let Some(key) = word_width {
                layout = layout.with_word_width(key);
            }

            let values = format.format().load(&params)?;
            if values.is_empty() {
                bail!("no parameters loaded from {}", params.display());
            }

            let pipeline = Pipeline::new(&settings, layout)?;
            let summary = pipeline.run(&values, &settings.output_dir)?;
            println!(
                "{}: {} bytes, {} words, {} clamped",
                summary.bin_path.display(),
                summary.tokens,
                summary.words,
                summary.report.clamped()
            );

            if verify {
                pipeline.verify(&values, &summary.bin_path)?;
                println!("verified {} elements", summary.elements);
            }
            Ok(())
        }

        Commands::Dump { input, per_line } => dump(&input, per_line),
    }
}
