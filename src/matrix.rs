//! All-pairs distance matrix
//!
//! One Dijkstra sweep per source node, rows computed in parallel. Memory is
//! `n * n` weights, so this is meant for graphs of a few tens of thousands of
//! nodes at most.

use rayon::prelude::*;
use std::path::Path;
use std::time::Instant;

use crate::dijkstra::{one_to_all, Direction};
use crate::error::{Error, Result};
use crate::graph::{Graph, NodeId};
use crate::weight::Weight;

/// Row-major `n * n` matrix: `get(s, t)` is the distance from `s` to `t`
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix<W> {
    n_nodes: usize,
    cells: Vec<W>,
}

impl<W: Weight> DistanceMatrix<W> {
    /// Run one forward sweep from every node
    pub fn compute(graph: &Graph<W>) -> Result<Self> {
        let n = graph.n_nodes();
        let size = n.checked_mul(n).ok_or_else(|| {
            Error::invalid_graph(format!("{} nodes are too many for a distance matrix", n))
        })?;
        tracing::info!(nodes = n, cells = size, "computing distance matrix");

        let start = Instant::now();
        let cells: Vec<W> = (0..n as NodeId)
            .into_par_iter()
            .map(|source| one_to_all(graph, source, Direction::Forward))
            .flatten()
            .collect();

        let matrix = Self { n_nodes: n, cells };
        tracing::info!(
            unreachable = matrix.cells.iter().filter(|d| d.is_infinite()).count(),
            ms = start.elapsed().as_millis() as u64,
            "distance matrix computed"
        );
        Ok(matrix)
    }

    pub fn n_nodes(&self) -> usize {
        self.n_nodes
    }

    pub fn get(&self, source: NodeId, target: NodeId) -> W {
        self.cells[source as usize * self.n_nodes + target as usize]
    }

    pub fn row(&self, source: NodeId) -> &[W] {
        let start = source as usize * self.n_nodes;
        &self.cells[start..start + self.n_nodes]
    }

    /// One line per source, comma-separated, no header.
    ///
    /// Unreachable cells are written as the domain sentinel (`4294967295` or
    /// `inf`).
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_path(path)?;
        for source in 0..self.n_nodes as NodeId {
            writer.write_record(self.row(source).iter().map(|d| d.to_string()))?;
        }
        writer.flush()?;
        tracing::info!(path = %path.display(), rows = self.n_nodes, "distance matrix written");
        Ok(())
    }
}
