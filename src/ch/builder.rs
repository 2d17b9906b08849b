//! Node ordering and contraction
//!
//! Priority of a node = edge difference (shortcuts needed minus incident arcs
//! removed) + contracted-neighbor count + hierarchy depth. After a contraction
//! the neighbors of the contracted node are re-simulated and reseated. The
//! queue is otherwise updated lazily: a popped node is re-simulated and pushed
//! back if it is no longer the cheapest. Ties go to the earliest insertion so
//! builds are reproducible.

use priority_queue::PriorityQueue;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::time::Instant;

use super::witness::{WitnessLimits, WitnessSearch};
use super::{ArcId, ArcKind, ChArc, ContractionHierarchy, Provenance};
use crate::error::Result;
use crate::graph::{Graph, NodeId};
use crate::weight::Weight;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WitnessMode {
    /// Hop limit 4, 1000 settled nodes per search
    Deep,
    /// Hop limit 2, 100 settled nodes per search
    Shallow,
}

/// Contraction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChConfig {
    pub witness_mode: WitnessMode,
    /// Overrides the mode's hop limit
    pub hop_limit: Option<u32>,
    /// Overrides the mode's settled-node limit
    pub settled_limit: Option<usize>,
}

impl Default for ChConfig {
    fn default() -> Self {
        Self {
            witness_mode: WitnessMode::Deep,
            hop_limit: None,
            settled_limit: None,
        }
    }
}

impl ChConfig {
    /// Limits for the witness searches that decide actual shortcuts
    pub fn contraction_limits(&self) -> WitnessLimits {
        let base = match self.witness_mode {
            WitnessMode::Deep => WitnessLimits::DEEP,
            WitnessMode::Shallow => WitnessLimits::SHALLOW,
        };
        WitnessLimits {
            hop_limit: self.hop_limit.unwrap_or(base.hop_limit),
            settled_limit: self.settled_limit.unwrap_or(base.settled_limit),
        }
    }

    /// Priority simulation always runs shallow
    pub fn simulation_limits(&self) -> WitnessLimits {
        let contraction = self.contraction_limits();
        WitnessLimits {
            hop_limit: contraction.hop_limit.min(WitnessLimits::SHALLOW.hop_limit),
            settled_limit: contraction
                .settled_limit
                .min(WitnessLimits::SHALLOW.settled_limit),
        }
    }
}

/// Statistics from CH construction
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChBuildStats {
    pub n_nodes: u32,
    pub n_original_arcs: u64,
    pub n_shortcuts: u64,
    pub n_superseded: u64,
    pub n_up_arcs: u64,
    pub n_down_arcs: u64,
    pub n_lazy_reinserts: u64,
    pub n_neighbor_updates: u64,
    pub ordering_time_ms: u64,
    pub contraction_time_ms: u64,
}

/// Remaining (uncontracted) graph plus the growing arc arena
pub(super) struct Overlay<W> {
    out: Vec<FxHashMap<NodeId, ArcId>>,
    inc: Vec<FxHashMap<NodeId, ArcId>>,
    arcs: Vec<ChArc<W>>,
}

impl<W: Weight> Overlay<W> {
    fn from_graph(graph: &Graph<W>) -> Self {
        let n = graph.n_nodes();
        let mut out = vec![FxHashMap::default(); n];
        let mut inc = vec![FxHashMap::default(); n];
        let mut arcs = Vec::with_capacity(graph.n_edges() * 2);
        for (u, v, w) in graph.edges() {
            let id = arcs.len() as ArcId;
            arcs.push(ChArc {
                source: u,
                target: v,
                weight: w,
                kind: ArcKind::Original,
                required: true,
            });
            out[u as usize].insert(v, id);
            inc[v as usize].insert(u, id);
        }
        Self { out, inc, arcs }
    }

    pub(super) fn out_arcs(&self, node: NodeId) -> impl Iterator<Item = (NodeId, W)> + '_ {
        self.out[node as usize]
            .iter()
            .map(move |(&v, &id)| (v, self.arcs[id as usize].weight))
    }

    fn weight(&self, id: ArcId) -> W {
        self.arcs[id as usize].weight
    }

    /// `(neighbor, arc)` lists sorted by neighbor for a deterministic sweep
    fn incident(&self, node: NodeId) -> (Vec<(NodeId, ArcId)>, Vec<(NodeId, ArcId)>) {
        let mut ins: Vec<_> = self.inc[node as usize].iter().map(|(&u, &a)| (u, a)).collect();
        let mut outs: Vec<_> = self.out[node as usize].iter().map(|(&w, &a)| (w, a)).collect();
        ins.sort_unstable();
        outs.sort_unstable();
        (ins, outs)
    }
}

struct Contractor<W> {
    overlay: Overlay<W>,
    contracted_neighbors: Vec<u32>,
    depth: Vec<u32>,
    n_shortcuts: u64,
    n_superseded: u64,
}

/// A shortcut `u -> w` that contracting some node would require
struct NeededShortcut<W> {
    from: NodeId,
    to: NodeId,
    weight: W,
    parts: [ArcId; 2],
}

impl<W: Weight> Contractor<W> {
    /// Witness-check every in/out pair around `node`
    fn needed_shortcuts(
        &self,
        node: NodeId,
        search: &mut WitnessSearch<W>,
        limits: WitnessLimits,
        ins: &[(NodeId, ArcId)],
        outs: &[(NodeId, ArcId)],
    ) -> Vec<NeededShortcut<W>> {
        let mut needed = Vec::new();
        for &(u, a_in) in ins {
            let w_in = self.overlay.weight(a_in);
            let max_cost = outs
                .iter()
                .filter(|&&(w, _)| w != u)
                .map(|&(_, a_out)| w_in.plus(self.overlay.weight(a_out)))
                .fold(W::ZERO, W::max_of);
            if outs.iter().all(|&(w, _)| w == u) {
                continue;
            }

            search.run(&self.overlay, u, node, max_cost, limits);

            for &(w, a_out) in outs {
                if w == u {
                    continue;
                }
                let via = w_in.plus(self.overlay.weight(a_out));
                if let Some(&existing) = self.overlay.out[u as usize].get(&w) {
                    if self.overlay.weight(existing) <= via {
                        continue;
                    }
                }
                if search.distance(w) <= via {
                    continue;
                }
                needed.push(NeededShortcut {
                    from: u,
                    to: w,
                    weight: via,
                    parts: [a_in, a_out],
                });
            }
        }
        needed
    }

    fn priority(&self, node: NodeId, search: &mut WitnessSearch<W>, limits: WitnessLimits) -> i64 {
        let (ins, outs) = self.overlay.incident(node);
        let shortcuts = self.needed_shortcuts(node, search, limits, &ins, &outs).len() as i64;
        let removed = (ins.len() + outs.len()) as i64;
        shortcuts - removed
            + self.contracted_neighbors[node as usize] as i64
            + self.depth[node as usize] as i64
    }

    /// Contract `node`, returning its former neighbors (sorted, deduplicated)
    fn contract(
        &mut self,
        node: NodeId,
        search: &mut WitnessSearch<W>,
        limits: WitnessLimits,
    ) -> Vec<NodeId> {
        let (ins, outs) = self.overlay.incident(node);
        let needed = self.needed_shortcuts(node, search, limits, &ins, &outs);

        for shortcut in needed {
            let id = self.overlay.arcs.len() as ArcId;
            self.overlay.arcs.push(ChArc {
                source: shortcut.from,
                target: shortcut.to,
                weight: shortcut.weight,
                kind: ArcKind::Shortcut {
                    middle: node,
                    parts: shortcut.parts,
                },
                required: true,
            });
            let replaced = self.overlay.out[shortcut.from as usize].insert(shortcut.to, id);
            self.overlay.inc[shortcut.to as usize].insert(shortcut.from, id);
            if let Some(old) = replaced {
                self.overlay.arcs[old as usize].required = false;
                self.n_superseded += 1;
            }
            self.n_shortcuts += 1;
        }

        for &(u, _) in &ins {
            self.overlay.out[u as usize].remove(&node);
        }
        for &(w, _) in &outs {
            self.overlay.inc[w as usize].remove(&node);
        }
        self.overlay.out[node as usize] = FxHashMap::default();
        self.overlay.inc[node as usize] = FxHashMap::default();

        let mut neighbors: Vec<NodeId> = ins.iter().chain(outs.iter()).map(|&(v, _)| v).collect();
        neighbors.sort_unstable();
        neighbors.dedup();

        let node_depth = self.depth[node as usize];
        for &neighbor in &neighbors {
            let n = neighbor as usize;
            self.contracted_neighbors[n] += 1;
            self.depth[n] = self.depth[n].max(node_depth + 1);
        }
        neighbors
    }
}

/// Contract `graph` into a hierarchy
pub fn build_ch<W: Weight>(
    graph: &Graph<W>,
    config: &ChConfig,
    provenance: Provenance,
) -> Result<(ContractionHierarchy<W>, ChBuildStats)> {
    let n_nodes = graph.n_nodes();
    let contraction_limits = config.contraction_limits();
    let simulation_limits = config.simulation_limits();

    tracing::info!(
        nodes = n_nodes,
        edges = graph.n_edges(),
        hop_limit = contraction_limits.hop_limit,
        settled_limit = contraction_limits.settled_limit,
        "building contraction hierarchy"
    );
    if graph.may_overflow() {
        tracing::warn!(
            bound = graph.distance_bound(),
            limit = W::INFINITY.as_f64(),
            "path lengths may exceed the integer distance range; such pairs will read as unreachable"
        );
    }

    let mut contractor = Contractor {
        overlay: Overlay::from_graph(graph),
        contracted_neighbors: vec![0; n_nodes],
        depth: vec![0; n_nodes],
        n_shortcuts: 0,
        n_superseded: 0,
    };

    // Initial priorities are independent simulations on the untouched graph.
    let ordering_start = Instant::now();
    let initial: Vec<i64> = (0..n_nodes as NodeId)
        .into_par_iter()
        .map_init(WitnessSearch::new, |search, node| {
            contractor.priority(node, search, simulation_limits)
        })
        .collect();

    let mut queue: PriorityQueue<NodeId, Reverse<(i64, u64)>> =
        PriorityQueue::with_capacity(n_nodes);
    for (node, &priority) in initial.iter().enumerate() {
        queue.push(node as NodeId, Reverse((priority, node as u64)));
    }
    let mut next_seq = n_nodes as u64;
    let ordering_time_ms = ordering_start.elapsed().as_millis() as u64;

    let contraction_start = Instant::now();
    let mut search = WitnessSearch::new();
    let mut ranks = vec![0u32; n_nodes];
    let mut next_rank = 0u32;
    let mut n_lazy_reinserts = 0u64;
    let mut n_neighbor_updates = 0u64;
    let progress_step = (n_nodes / 10).max(1);

    while let Some((node, _)) = queue.pop() {
        let current = contractor.priority(node, &mut search, simulation_limits);
        if let Some((_, Reverse((next_best, _)))) = queue.peek() {
            if current > *next_best {
                queue.push(node, Reverse((current, next_seq)));
                next_seq += 1;
                n_lazy_reinserts += 1;
                continue;
            }
        }

        let neighbors = contractor.contract(node, &mut search, contraction_limits);
        ranks[node as usize] = next_rank;
        next_rank += 1;

        for neighbor in neighbors {
            let priority = contractor.priority(neighbor, &mut search, simulation_limits);
            if queue
                .change_priority(&neighbor, Reverse((priority, next_seq)))
                .is_some()
            {
                next_seq += 1;
                n_neighbor_updates += 1;
            }
        }

        if next_rank as usize % progress_step == 0 {
            tracing::debug!(
                contracted = next_rank,
                total = n_nodes,
                shortcuts = contractor.n_shortcuts,
                "contraction progress"
            );
        }
    }
    let contraction_time_ms = contraction_start.elapsed().as_millis() as u64;

    let n_shortcuts = contractor.n_shortcuts;
    let n_superseded = contractor.n_superseded;
    let ch = ContractionHierarchy::from_parts(ranks, contractor.overlay.arcs, provenance)?;

    let stats = ChBuildStats {
        n_nodes: n_nodes as u32,
        n_original_arcs: graph.n_edges() as u64,
        n_shortcuts,
        n_superseded,
        n_up_arcs: ch.up().len() as u64,
        n_down_arcs: ch.down().len() as u64,
        n_lazy_reinserts,
        n_neighbor_updates,
        ordering_time_ms,
        contraction_time_ms,
    };

    tracing::info!(
        shortcuts = stats.n_shortcuts,
        superseded = stats.n_superseded,
        up_arcs = stats.n_up_arcs,
        down_arcs = stats.n_down_arcs,
        reinserts = stats.n_lazy_reinserts,
        neighbor_updates = stats.n_neighbor_updates,
        ms = stats.ordering_time_ms + stats.contraction_time_ms,
        "contraction hierarchy built"
    );

    Ok((ch, stats))
}
