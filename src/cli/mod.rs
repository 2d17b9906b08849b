//! Command-line definitions for butterfly-distance
//!
//! Argument parsing, build configuration merging and logging setup. The
//! command implementations live in `main.rs`.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use butterfly_distance::ch::{ChConfig, WitnessMode};
use butterfly_distance::loaders::GraphFormat;
use butterfly_distance::tnr::TnrMode;
use butterfly_distance::tnraf::TnrafConfig;
use butterfly_distance::NumericDomain;

#[derive(Parser)]
#[command(name = "butterfly-distance")]
#[command(about = "Exact point-to-point distances with CH, TNR and TNR + arc flags", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Log output format
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a Contraction Hierarchy structure
    BuildCh {
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Build a Transit Node Routing structure
    BuildTnr {
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Build a TNR structure with region arc flags
    BuildTnraf {
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Write the all-pairs distance matrix of a graph as CSV
    BuildDm {
        /// Input graph (file, or directory of CSV tables)
        input: PathBuf,
        /// Output CSV file, one row per source node
        output: PathBuf,
        #[arg(long, value_enum)]
        format: Option<GraphFormat>,
        #[arg(long, value_enum, default_value = "integer")]
        domain: NumericDomain,
        #[arg(long, default_value_t = 1)]
        precision_loss: u32,
    },
    /// Answer one query or a query-set file
    Query {
        /// Structure file (.bdch, .bdtn, .bdta)
        structure: PathBuf,
        /// Mapping file (binary or XID text); ids are then external ids
        #[arg(short, long)]
        mapping: Option<PathBuf>,
        /// Source node
        #[arg(long, requires = "to", conflicts_with = "queries")]
        from: Option<u64>,
        /// Target node
        #[arg(long, requires = "from")]
        to: Option<u64>,
        /// Query-set file (count, then one `from to` pair per line)
        #[arg(short, long)]
        queries: Option<PathBuf>,
    },
    /// Compare a structure against Dijkstra on its source graph
    Validate {
        /// Structure file
        structure: PathBuf,
        /// Graph the structure was built from
        input: PathBuf,
        #[arg(long, value_enum)]
        format: Option<GraphFormat>,
        /// Precision loss used at build time
        #[arg(long, default_value_t = 1)]
        precision_loss: u32,
        /// Number of random queries
        #[arg(short = 'n', long, default_value_t = 1000)]
        tests: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Print structure statistics
    Info {
        /// Structure file
        structure: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
pub struct BuildArgs {
    /// Input graph (.xeng XenGraph, .gr DIMACS, or a directory of CSV tables)
    pub input: PathBuf,
    /// Output structure file
    pub output: PathBuf,
    /// Input format (detected from the extension when omitted)
    #[arg(long, value_enum)]
    pub format: Option<GraphFormat>,
    /// Weight domain
    #[arg(long, value_enum, default_value = "integer")]
    pub domain: NumericDomain,
    /// Divide integer weights by this factor before building
    #[arg(long, default_value_t = 1)]
    pub precision_loss: u32,
    /// Write the internal -> external id mapping here
    #[arg(long)]
    pub mapping_out: Option<PathBuf>,
    /// JSON build configuration; flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long, value_enum)]
    pub witness_mode: Option<WitnessMode>,
    #[arg(long)]
    pub hop_limit: Option<u32>,
    #[arg(long)]
    pub settled_limit: Option<usize>,
    /// Number of transit nodes
    #[arg(long)]
    pub transit_count: Option<usize>,
    #[arg(long, value_enum)]
    pub tnr_mode: Option<TnrMode>,
    /// Number of arc-flag regions (at most 32)
    #[arg(long)]
    pub regions: Option<usize>,
}

/// Everything a build reads from `--config`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub ch: ChConfig,
    pub tnraf: TnrafConfig,
}

impl BuildConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Failed to parse config {}", path.display()))
    }
}

impl BuildArgs {
    /// Config file (or defaults) with explicit flags applied on top
    pub fn resolve_config(&self) -> Result<BuildConfig> {
        let mut config = match &self.config {
            Some(path) => BuildConfig::load(path)?,
            None => BuildConfig::default(),
        };
        if let Some(mode) = self.witness_mode {
            config.ch.witness_mode = mode;
        }
        if self.hop_limit.is_some() {
            config.ch.hop_limit = self.hop_limit;
        }
        if self.settled_limit.is_some() {
            config.ch.settled_limit = self.settled_limit;
        }
        if let Some(k) = self.transit_count {
            config.tnraf.tnr.transit_count = k;
        }
        if let Some(mode) = self.tnr_mode {
            config.tnraf.tnr.mode = mode;
        }
        if let Some(regions) = self.regions {
            config.tnraf.region_count = regions;
        }
        Ok(config)
    }

    pub fn graph_format(&self) -> Result<GraphFormat> {
        resolve_format(&self.input, self.format)
    }
}

pub fn resolve_format(input: &Path, explicit: Option<GraphFormat>) -> Result<GraphFormat> {
    explicit
        .or_else(|| GraphFormat::detect(input))
        .with_context(|| format!("Cannot detect the format of {}, pass --format", input.display()))
}

/// Install the tracing subscriber; `RUST_LOG` overrides the `info` default
pub fn init_logging(format: LogFormat) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
