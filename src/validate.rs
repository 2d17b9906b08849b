//! Validation of loaded structures
//!
//! Compares any [`DistanceEngine`] against Dijkstra on the original graph over
//! random `(s, t)` pairs.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::dijkstra::shortest_distance;
use crate::error::{Error, Result};
use crate::graph::{Graph, NodeId};
use crate::manager::DistanceEngine;
use crate::weight::Weight;

const MAX_REPORTED_ERRORS: usize = 10;

/// Validate `engine` against Dijkstra on `graph`
pub fn validate_engine<W: Weight, E: DistanceEngine<W> + ?Sized>(
    graph: &Graph<W>,
    engine: &E,
    n_tests: usize,
    seed: u64,
) -> Result<ValidationResult> {
    let n_nodes = graph.n_nodes();
    if n_nodes != engine.n_nodes() {
        return Err(Error::invalid_graph(format!(
            "graph has {} nodes but the structure has {}",
            n_nodes,
            engine.n_nodes()
        )));
    }
    let mut result = ValidationResult::default();
    if n_nodes == 0 {
        return Ok(result);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    println!("Validating {} random queries...", n_tests);

    for i in 0..n_tests {
        let source = rng.random_range(0..n_nodes as NodeId);
        let target = rng.random_range(0..n_nodes as NodeId);

        let dijkstra_dist = shortest_distance(graph, source, target);
        let engine_dist = engine.distance(source, target);
        result.n_tests += 1;

        if dijkstra_dist.is_infinite() && engine_dist.is_infinite() {
            result.unreachable_both += 1;
            result.correct += 1;
        } else if W::tight(dijkstra_dist, engine_dist) {
            result.correct += 1;
        } else {
            result.incorrect += 1;
            if result.errors.len() < MAX_REPORTED_ERRORS {
                result.errors.push(ValidationError {
                    source,
                    target,
                    dijkstra_dist: dijkstra_dist.as_f64(),
                    engine_dist: engine_dist.as_f64(),
                });
            }
        }

        if (i + 1) % 1000 == 0 {
            println!(
                "  {}/{} queries, {} correct, {} incorrect",
                i + 1,
                n_tests,
                result.correct,
                result.incorrect
            );
        }
    }

    tracing::info!(tests = result.n_tests, incorrect = result.incorrect, "validation finished");
    Ok(result)
}

#[derive(Debug, Default)]
pub struct ValidationResult {
    pub n_tests: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub unreachable_both: usize,
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn print(&self) {
        let pct = |count: usize| {
            if self.n_tests == 0 {
                0.0
            } else {
                count as f64 * 100.0 / self.n_tests as f64
            }
        };
        println!("\n=== VALIDATION RESULTS ===");
        println!("  Total tests:     {}", self.n_tests);
        println!("  Correct:         {} ({:.2}%)", self.correct, pct(self.correct));
        println!("  Incorrect:       {} ({:.2}%)", self.incorrect, pct(self.incorrect));
        println!("  Unreachable:     {}", self.unreachable_both);

        if !self.errors.is_empty() {
            println!("\n  Sample errors:");
            for err in &self.errors {
                println!(
                    "    {} → {}: Dijkstra={}, engine={}",
                    err.source, err.target, err.dijkstra_dist, err.engine_dist
                );
            }
        }

        if self.incorrect == 0 {
            println!("\n  ✅ ALL TESTS PASSED!");
        } else {
            println!("\n  ❌ VALIDATION FAILED!");
        }
    }

    pub fn is_valid(&self) -> bool {
        self.incorrect == 0
    }
}

#[derive(Debug)]
pub struct ValidationError {
    pub source: NodeId,
    pub target: NodeId,
    pub dijkstra_dist: f64,
    pub engine_dist: f64,
}
