//! Directed weighted graph in forward + reverse CSR form
//!
//! Node ids are dense `u32` in `[0, n_nodes)`. Edge ids are positions in the
//! forward CSR and are stable for the lifetime of a graph.

use crate::error::{Error, Result};
use crate::weight::Weight;

pub type NodeId = u32;
pub type EdgeId = u32;

/// Immutable directed graph with out- and in-adjacency
#[derive(Debug, Clone)]
pub struct Graph<W> {
    n_nodes: u32,
    out_offsets: Vec<u64>,
    out_heads: Vec<u32>,
    out_weights: Vec<W>,
    in_offsets: Vec<u64>,
    in_tails: Vec<u32>,
    in_weights: Vec<W>,
}

impl<W: Weight> Graph<W> {
    /// Build from an edge list.
    ///
    /// Self-loops are dropped and parallel edges keep their minimum weight.
    pub fn from_edges(n_nodes: usize, edges: &[(NodeId, NodeId, W)]) -> Result<Self> {
        if n_nodes >= u32::MAX as usize {
            return Err(Error::invalid_graph(format!(
                "{} nodes exceed the u32 index space",
                n_nodes
            )));
        }

        let mut list: Vec<(u32, u32, W)> = Vec::with_capacity(edges.len());
        for (i, &(from, to, weight)) in edges.iter().enumerate() {
            if from as usize >= n_nodes || to as usize >= n_nodes {
                return Err(Error::invalid_graph(format!(
                    "edge {} ({} -> {}) has an endpoint outside [0, {})",
                    i, from, to, n_nodes
                )));
            }
            if !weight.is_valid_edge_weight() {
                return Err(Error::invalid_graph(format!(
                    "edge {} ({} -> {}) has unsupported weight {}",
                    i, from, to, weight
                )));
            }
            if from != to {
                list.push((from, to, weight));
            }
        }

        list.sort_unstable_by(|a, b| {
            a.0.cmp(&b.0)
                .then(a.1.cmp(&b.1))
                .then(a.2.total_cmp(&b.2))
        });
        list.dedup_by(|next, kept| next.0 == kept.0 && next.1 == kept.1);

        let n = n_nodes;
        let m = list.len();

        let mut out_offsets = vec![0u64; n + 1];
        let mut in_offsets = vec![0u64; n + 1];
        for &(u, v, _) in &list {
            out_offsets[u as usize + 1] += 1;
            in_offsets[v as usize + 1] += 1;
        }
        for i in 0..n {
            out_offsets[i + 1] += out_offsets[i];
            in_offsets[i + 1] += in_offsets[i];
        }

        let out_heads: Vec<u32> = list.iter().map(|&(_, v, _)| v).collect();
        let out_weights: Vec<W> = list.iter().map(|&(_, _, w)| w).collect();

        let mut in_tails = vec![0u32; m];
        let mut in_weights = vec![W::ZERO; m];
        let mut cursor: Vec<u64> = in_offsets[..n].to_vec();
        // Tails are visited in ascending order, so each in-list ends up sorted.
        for &(u, v, w) in &list {
            let pos = cursor[v as usize] as usize;
            in_tails[pos] = u;
            in_weights[pos] = w;
            cursor[v as usize] += 1;
        }

        Ok(Self {
            n_nodes: n as u32,
            out_offsets,
            out_heads,
            out_weights,
            in_offsets,
            in_tails,
            in_weights,
        })
    }

    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.n_nodes as usize
    }

    #[inline]
    pub fn n_edges(&self) -> usize {
        self.out_heads.len()
    }

    /// Outgoing `(head, weight)` pairs, sorted by head
    #[inline(always)]
    pub fn neighbors_out(&self, node: NodeId) -> impl Iterator<Item = (NodeId, W)> + '_ {
        let start = self.out_offsets[node as usize] as usize;
        let end = self.out_offsets[node as usize + 1] as usize;
        (start..end).map(move |i| (self.out_heads[i], self.out_weights[i]))
    }

    /// Incoming `(tail, weight)` pairs, sorted by tail
    #[inline(always)]
    pub fn neighbors_in(&self, node: NodeId) -> impl Iterator<Item = (NodeId, W)> + '_ {
        let start = self.in_offsets[node as usize] as usize;
        let end = self.in_offsets[node as usize + 1] as usize;
        (start..end).map(move |i| (self.in_tails[i], self.in_weights[i]))
    }

    pub fn out_degree(&self, node: NodeId) -> usize {
        (self.out_offsets[node as usize + 1] - self.out_offsets[node as usize]) as usize
    }

    pub fn in_degree(&self, node: NodeId) -> usize {
        (self.in_offsets[node as usize + 1] - self.in_offsets[node as usize]) as usize
    }

    /// Weight of the edge `from -> to`, if present
    pub fn edge_weight(&self, from: NodeId, to: NodeId) -> Option<W> {
        if from >= self.n_nodes || to >= self.n_nodes {
            return None;
        }
        let start = self.out_offsets[from as usize] as usize;
        let end = self.out_offsets[from as usize + 1] as usize;
        self.out_heads[start..end]
            .binary_search(&to)
            .ok()
            .map(|i| self.out_weights[start + i])
    }

    /// Id of the edge `from -> to`, if present
    pub fn edge_id(&self, from: NodeId, to: NodeId) -> Option<EdgeId> {
        if from >= self.n_nodes || to >= self.n_nodes {
            return None;
        }
        let start = self.out_offsets[from as usize] as usize;
        let end = self.out_offsets[from as usize + 1] as usize;
        self.out_heads[start..end]
            .binary_search(&to)
            .ok()
            .map(|i| (start + i) as EdgeId)
    }

    /// `(from, to, weight)` of an edge id
    pub fn edge(&self, id: EdgeId) -> (NodeId, NodeId, W) {
        let idx = id as u64;
        // Last offset <= idx whose range is non-empty.
        let from = self.out_offsets.partition_point(|&o| o <= idx) - 1;
        (from as u32, self.out_heads[id as usize], self.out_weights[id as usize])
    }

    /// All edges in edge-id order
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId, W)> + '_ {
        (0..self.n_nodes).flat_map(move |u| self.neighbors_out(u).map(move |(v, w)| (u, v, w)))
    }

    /// Upper bound on any shortest-path distance: the cheaper of the total
    /// edge weight and `(n - 1) * max weight`
    pub fn distance_bound(&self) -> f64 {
        let (total, max) = self
            .out_weights
            .iter()
            .fold((0.0f64, 0.0f64), |(total, max), w| {
                let w = w.as_f64();
                (total + w, max.max(w))
            });
        total.min(self.n_nodes.saturating_sub(1) as f64 * max)
    }

    /// Whether some distance could reach the unreachable sentinel.
    ///
    /// Never true for `f64`; for `u32` it means a reachable pair may be
    /// reported as unreachable.
    pub fn may_overflow(&self) -> bool {
        self.distance_bound() >= W::INFINITY.as_f64()
    }
}
