//! Query benchmark harness
//!
//! Loads one structure through the query manager and times random or
//! file-supplied queries. Outputs latency percentiles plus parallel
//! throughput.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use hdrhistogram::Histogram;
use rand::prelude::*;
use rayon::prelude::*;

use butterfly_distance::loaders::load_query_set;
use butterfly_distance::manager::format_number;
use butterfly_distance::{DistanceQueryManager, IdMapping};

#[derive(Parser)]
#[command(name = "butterfly-distance-bench")]
#[command(about = "Latency and throughput benchmark for butterfly-distance structures")]
struct Cli {
    /// Structure file (.bdch, .bdtn, .bdta)
    structure: PathBuf,

    /// Mapping file; query-set ids are then external ids
    #[arg(short, long)]
    mapping: Option<PathBuf>,

    /// Query-set file (random pairs when omitted)
    #[arg(short, long)]
    queries: Option<PathBuf>,

    /// Number of random queries
    #[arg(short = 'n', long, default_value = "10000")]
    n_queries: usize,

    /// Queries run before timing starts
    #[arg(long, default_value = "1000")]
    warmup: usize,

    /// Random seed for reproducibility
    #[arg(long, default_value = "42")]
    seed: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    println!("═══════════════════════════════════════════════════════════════");
    println!("  BUTTERFLY-DISTANCE QUERY BENCHMARK");
    println!("═══════════════════════════════════════════════════════════════");
    println!("  Structure: {}", cli.structure.display());

    println!("[1/3] Loading structure...");
    let load_start = Instant::now();
    let manager = DistanceQueryManager::new();
    manager
        .initialize(&cli.structure, cli.mapping.as_deref())
        .with_context(|| format!("Failed to load {}", cli.structure.display()))?;
    let info = manager.info()?;
    println!(
        "  {} ({}), {} nodes, loaded in {:.2}s",
        info.kind,
        info.domain,
        format_number(info.n_nodes as u64),
        load_start.elapsed().as_secs_f64()
    );

    println!("[2/3] Preparing queries...");
    let pairs = match &cli.queries {
        Some(path) => internal_pairs(path, cli.mapping.as_deref())?,
        None => {
            let mut rng = StdRng::seed_from_u64(cli.seed);
            let n = info.n_nodes as u32;
            anyhow::ensure!(n > 0, "structure has no nodes");
            (0..cli.n_queries)
                .map(|_| (rng.random_range(0..n), rng.random_range(0..n)))
                .collect::<Vec<_>>()
        }
    };
    println!("  {} queries", format_number(pairs.len() as u64));

    for &(s, t) in pairs.iter().cycle().take(cli.warmup.min(pairs.len() * 4)) {
        manager.distance_query(s, t)?;
    }

    println!("[3/3] Running...");
    let mut hist = Histogram::<u64>::new(3)?;
    let mut unreachable = 0usize;
    for &(s, t) in &pairs {
        let start = Instant::now();
        let d = manager.distance_query(s, t)?;
        hist.record(start.elapsed().as_nanos() as u64)?;
        if d.is_unreachable() {
            unreachable += 1;
        }
    }
    print_histogram_stats("Query", &hist);
    println!("    unreachable: {}", format_number(unreachable as u64));

    let par_start = Instant::now();
    let answered: usize = pairs
        .par_iter()
        .map(|&(s, t)| manager.distance_query(s, t).map(|_| 1usize))
        .sum::<butterfly_distance::Result<usize>>()?;
    let elapsed = par_start.elapsed().as_secs_f64();
    println!("───────────────────────────────────────────────────────────────");
    println!(
        "  Parallel throughput: {} queries/s ({} threads)",
        format_number((answered as f64 / elapsed.max(1e-9)) as u64),
        rayon::current_num_threads()
    );

    manager.clear_structures();
    Ok(())
}

/// Query-set pairs translated to internal indices
fn internal_pairs(path: &Path, mapping: Option<&Path>) -> Result<Vec<(u32, u32)>> {
    let raw = load_query_set(path)?;
    match mapping {
        Some(mapping) => {
            let mapping = IdMapping::load(mapping)?;
            raw.into_iter()
                .map(|(s, t)| -> Result<(u32, u32)> { Ok((mapping.internal_of(s)?, mapping.internal_of(t)?)) })
                .collect()
        }
        None => raw
            .into_iter()
            .map(|(s, t)| -> Result<(u32, u32)> { Ok((u32::try_from(s)?, u32::try_from(t)?)) })
            .collect(),
    }
}

/// Recorded values are nanoseconds; printed as microseconds
fn print_histogram_stats(name: &str, hist: &Histogram<u64>) {
    let us = |ns: u64| ns as f64 / 1000.0;
    println!("───────────────────────────────────────────────────────────────");
    println!("  {} timing (μs)", name);
    println!("───────────────────────────────────────────────────────────────");
    println!("    min:    {:>10.2}", us(hist.min()));
    println!("    p50:    {:>10.2}", us(hist.value_at_quantile(0.50)));
    println!("    p90:    {:>10.2}", us(hist.value_at_quantile(0.90)));
    println!("    p95:    {:>10.2}", us(hist.value_at_quantile(0.95)));
    println!("    p99:    {:>10.2}", us(hist.value_at_quantile(0.99)));
    println!("    max:    {:>10.2}", us(hist.max()));
    println!("    mean:   {:>10.2}", hist.mean() / 1000.0);
    println!("    stdev:  {:>10.2}", hist.stdev() / 1000.0);
}
