//! # butterfly-distance CLI
//!
//! Builds CH / TNR / TNRAF structures from text graphs and answers distance
//! queries against them.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;

use butterfly_distance::ch::{build_ch, Provenance};
use butterfly_distance::formats::{ChFile, IdMapFile, TnrFile, TnrafFile};
use butterfly_distance::loaders::{load_graph, load_query_set, GraphFormat};
use butterfly_distance::manager::{format_number, load_structure, LoadedEngine};
use butterfly_distance::tnr::build_tnr;
use butterfly_distance::tnraf::build_tnraf;
use butterfly_distance::validate::validate_engine;
use butterfly_distance::{DistanceMatrix, DistanceQueryManager, NumericDomain, Weight};

mod cli;

use cli::{BuildArgs, BuildConfig, Cli, Commands};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StructureTarget {
    Ch,
    Tnr,
    Tnraf,
}

fn main() {
    let cli = Cli::parse();
    cli::init_logging(cli.log_format);

    if let Err(e) = run(cli) {
        tracing::error!("{:#}", e);
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::BuildCh { build } => run_build(&build, StructureTarget::Ch),
        Commands::BuildTnr { build } => run_build(&build, StructureTarget::Tnr),
        Commands::BuildTnraf { build } => run_build(&build, StructureTarget::Tnraf),
        Commands::BuildDm {
            input,
            output,
            format,
            domain,
            precision_loss,
        } => {
            let format = cli::resolve_format(&input, format)?;
            match domain {
                NumericDomain::Integer => write_matrix::<u32>(&input, &output, format, precision_loss),
                NumericDomain::Real => write_matrix::<f64>(&input, &output, format, precision_loss),
            }
        }
        Commands::Query {
            structure,
            mapping,
            from,
            to,
            queries,
        } => run_query(&structure, mapping.as_deref(), from.zip(to), queries.as_deref()),
        Commands::Validate {
            structure,
            input,
            format,
            precision_loss,
            tests,
            seed,
        } => {
            let format = cli::resolve_format(&input, format)?;
            let engine = load_structure(&structure)
                .with_context(|| format!("Failed to load {}", structure.display()))?;
            let result = match &engine {
                LoadedEngine::Integer(engine) => {
                    let graph = load_graph::<u32, _>(&input, format, precision_loss)?.graph;
                    validate_engine(&graph, &**engine, tests, seed)?
                }
                LoadedEngine::Real(engine) => {
                    let graph = load_graph::<f64, _>(&input, format, precision_loss)?.graph;
                    validate_engine(&graph, &**engine, tests, seed)?
                }
            };
            result.print();
            if !result.is_valid() {
                bail!("{} of {} queries disagree with Dijkstra", result.incorrect, result.n_tests);
            }
            Ok(())
        }
        Commands::Info { structure, json } => {
            let engine = load_structure(&structure)
                .with_context(|| format!("Failed to load {}", structure.display()))?;
            let info = engine.describe();
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                info.print();
            }
            Ok(())
        }
    }
}

/// SHA-256 over the concatenated build input files
fn compute_sha256(paths: &[PathBuf]) -> Result<[u8; 32]> {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 1024 * 1024];
    for path in paths {
        let mut file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        loop {
            let n = file.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }
    }
    Ok(hasher.finalize().into())
}

fn write_matrix<W: Weight>(input: &Path, output: &Path, format: GraphFormat, precision_loss: u32) -> Result<()> {
    let start = Instant::now();
    let loaded = load_graph::<W, _>(input, format, precision_loss)
        .with_context(|| format!("Failed to load graph {}", input.display()))?;
    let n = loaded.graph.n_nodes() as u64;
    println!("🦋 Building distance matrix ({}) from {}", W::DOMAIN, input.display());
    println!(
        "  Graph: {} nodes, {} edges, {} cells",
        format_number(n),
        format_number(loaded.graph.n_edges() as u64),
        format_number(n.saturating_mul(n))
    );

    let matrix = DistanceMatrix::compute(&loaded.graph)?;
    matrix
        .write_csv(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("  ✓ Wrote {}", output.display());
    println!("  Done in {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}

fn run_build(args: &BuildArgs, target: StructureTarget) -> Result<()> {
    let config = args.resolve_config()?;
    tracing::debug!(config = %serde_json::to_string(&config)?, "resolved build config");
    match args.domain {
        NumericDomain::Integer => build_typed::<u32>(args, &config, target),
        NumericDomain::Real => build_typed::<f64>(args, &config, target),
    }
}

fn build_typed<W: Weight>(args: &BuildArgs, config: &BuildConfig, target: StructureTarget) -> Result<()> {
    let start = Instant::now();
    let format = args.graph_format()?;
    let loaded = load_graph::<W, _>(&args.input, format, args.precision_loss)
        .with_context(|| format!("Failed to load graph {}", args.input.display()))?;

    let provenance = Provenance {
        created_unix: chrono::Utc::now().timestamp(),
        inputs_sha: compute_sha256(&format.input_files(&args.input))?,
    };

    println!("🦋 Building {:?} ({}) from {}", target, W::DOMAIN, args.input.display());
    println!(
        "  Graph: {} nodes, {} edges",
        format_number(loaded.graph.n_nodes() as u64),
        format_number(loaded.graph.n_edges() as u64)
    );

    let (ch, ch_stats) = build_ch(&loaded.graph, &config.ch, provenance)?;
    println!(
        "  CH: {} shortcuts, {} required arcs ({} ms ordering, {} ms contraction)",
        format_number(ch_stats.n_shortcuts as u64),
        format_number((ch_stats.n_up_arcs + ch_stats.n_down_arcs) as u64),
        ch_stats.ordering_time_ms,
        ch_stats.contraction_time_ms
    );

    match target {
        StructureTarget::Ch => ChFile::write(&args.output, &ch)?,
        StructureTarget::Tnr => {
            let (tnr, stats) = build_tnr(ch, &config.tnraf.tnr)?;
            println!(
                "  TNR: {} transit nodes, {} access entries ({} dropped)",
                stats.n_transit,
                format_number(stats.forward_access_entries + stats.backward_access_entries),
                format_number(stats.dropped_access_entries)
            );
            TnrFile::write(&args.output, &tnr)?;
        }
        StructureTarget::Tnraf => {
            let (tnr, _) = build_tnr(ch, &config.tnraf.tnr)?;
            let (flags, stats) = build_tnraf(&loaded.graph, tnr, &config.tnraf)?;
            println!(
                "  TNRAF: {} regions, {:.2} region bits per arc, {} unused access entries",
                stats.n_regions, stats.arc_flag_density, stats.unused_access_entries
            );
            TnrafFile::write(&args.output, &flags)?;
        }
    }
    println!("  ✓ Wrote {}", args.output.display());

    if let Some(path) = &args.mapping_out {
        IdMapFile::write(path, &loaded.external_ids)?;
        println!("  ✓ Wrote mapping {}", path.display());
    }
    println!("  Done in {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}

fn run_query(
    structure: &Path,
    mapping: Option<&Path>,
    pair: Option<(u64, u64)>,
    queries: Option<&Path>,
) -> Result<()> {
    let manager = DistanceQueryManager::new();
    manager
        .initialize(structure, mapping)
        .with_context(|| format!("Failed to initialize from {}", structure.display()))?;
    let mapped = manager.has_mapping();

    let pairs = match (pair, queries) {
        (Some(pair), _) => vec![pair],
        (None, Some(path)) => load_query_set(path)?,
        (None, None) => bail!("Pass --from/--to or --queries"),
    };

    let start = Instant::now();
    for (from, to) in &pairs {
        let distance = if mapped {
            manager.distance_query_mapped(*from, *to)
        } else {
            let from = u32::try_from(*from).context("internal index exceeds u32")?;
            let to = u32::try_from(*to).context("internal index exceeds u32")?;
            manager.distance_query(from, to)
        };
        match distance {
            Ok(d) => println!("{} {} {}", from, to, d),
            Err(e) => println!("{} {} error: {}", from, to, e),
        }
    }
    tracing::info!(queries = pairs.len(), ms = start.elapsed().as_millis() as u64, "queries answered");

    manager.clear_structures();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_sha256() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("input.gr");
        std::fs::write(&path, b"abc").unwrap();
        let digest = compute_sha256(&[path]).unwrap();
        assert_eq!(
            hex::encode(digest),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );

        // a CSV directory hashes its tables in order: "a" + "bc" == "abc"
        std::fs::write(dir.path().join("nodes.csv"), b"a").unwrap();
        std::fs::write(dir.path().join("edges.csv"), b"bc").unwrap();
        let files = GraphFormat::Csv.input_files(dir.path());
        assert_eq!(compute_sha256(&files).unwrap(), digest);
    }
}
