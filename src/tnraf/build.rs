//! Arc-flag precomputation
//!
//! One forward and one backward Dijkstra over the original graph per node.
//! For a forward sweep from `s`:
//!
//! - a downward CH arc `u -> v` gets `region(s)` in its backward mask when
//!   `d(s, u) + w == d(s, v)`, so the backward search from any target keeps it
//!   for queries starting in `s`'s region;
//! - each forward access entry `(s, a)` whose stored distance is exact labels
//!   `a`, the label spreads along tight edges, and every labelled node `x`
//!   adds `region(x)` to that entry's mask.
//!
//! The backward sweep from `t` mirrors both rules. Sweeps run on rayon and
//! the per-thread arc masks are OR-reduced.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::regions::{partition, Regions, MAX_REGIONS};
use super::{FlagMasks, TnrArcFlags};
use crate::ch::ArcId;
use crate::dijkstra::{one_to_all, Direction};
use crate::error::{Error, Result};
use crate::graph::{Graph, NodeId};
use crate::tnr::{AccessTable, TnrConfig, TransitNodeRouting};
use crate::weight::{Ordered, Weight};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TnrafConfig {
    pub tnr: TnrConfig,
    /// Number of flag regions, at most 32
    pub region_count: usize,
}

impl Default for TnrafConfig {
    fn default() -> Self {
        Self {
            tnr: TnrConfig::default(),
            region_count: MAX_REGIONS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TnrafBuildStats {
    pub n_regions: u32,
    pub region_sizes: Vec<usize>,
    /// Average number of region bits set per required arc mask
    pub arc_flag_density: f64,
    /// Access entries no query will ever use
    pub unused_access_entries: u64,
    pub sweep_time_ms: u64,
}

struct SweepContext<'a, W> {
    graph: &'a Graph<W>,
    tnr: &'a TransitNodeRouting<W>,
    regions: &'a Regions,
    /// Required upward arcs, flagged by backward sweeps
    up_arcs: Vec<ArcId>,
    /// Required downward arcs, flagged by forward sweeps
    down_arcs: Vec<ArcId>,
}

impl<W: Weight> SweepContext<'_, W> {
    fn access(&self, direction: Direction) -> &AccessTable<W> {
        match direction {
            Direction::Forward => self.tnr.forward(),
            Direction::Backward => self.tnr.backward(),
        }
    }

    fn flagged_arcs(&self, direction: Direction) -> &[ArcId] {
        match direction {
            Direction::Forward => &self.down_arcs,
            Direction::Backward => &self.up_arcs,
        }
    }
}

/// Per-thread accumulator
struct Sweep {
    arc_masks: Vec<u32>,
    entry_masks: Vec<(NodeId, Vec<u32>)>,
    labels: Vec<u64>,
}

impl Sweep {
    fn new(n_arcs: usize, n_nodes: usize) -> Self {
        Self {
            arc_masks: vec![0; n_arcs],
            entry_masks: Vec::new(),
            labels: vec![0; n_nodes],
        }
    }

    fn empty() -> Self {
        Self {
            arc_masks: Vec::new(),
            entry_masks: Vec::new(),
            labels: Vec::new(),
        }
    }

    fn merge(mut self, other: Sweep) -> Sweep {
        if self.arc_masks.is_empty() {
            return other;
        }
        if other.arc_masks.is_empty() {
            return self;
        }
        for (mine, theirs) in self.arc_masks.iter_mut().zip(&other.arc_masks) {
            *mine |= theirs;
        }
        self.entry_masks.extend(other.entry_masks);
        self
    }
}

fn sweep_root<W: Weight>(ctx: &SweepContext<'_, W>, direction: Direction, root: NodeId, acc: &mut Sweep) {
    let graph = ctx.graph;
    let dist = one_to_all(graph, root, direction);
    let tight_step = |near: NodeId, w: W, far: NodeId| {
        let d = dist[near as usize];
        !d.is_infinite() && W::tight(d.plus(w), dist[far as usize])
    };

    let root_bit = ctx.regions.bit(root);
    let ch = ctx.tnr.ch();
    for &id in ctx.flagged_arcs(direction) {
        let arc = ch.arc(id);
        let (near, far) = match direction {
            Direction::Forward => (arc.source, arc.target),
            Direction::Backward => (arc.target, arc.source),
        };
        if tight_step(near, arc.weight, far) {
            acc.arc_masks[id as usize] |= root_bit;
        }
    }

    let table = ctx.access(direction);
    let entries = &table.entries()[table.entry_range(root)];
    let mut masks = vec![0u32; entries.len()];
    if entries.is_empty() {
        acc.entry_masks.push((root, masks));
        return;
    }

    let mut order: Vec<NodeId> = (0..graph.n_nodes() as NodeId)
        .filter(|&v| !dist[v as usize].is_infinite())
        .collect();
    order.sort_unstable_by_key(|&v| (Ordered(dist[v as usize]), v));

    let transit_nodes = ctx.tnr.transit_nodes();
    for (chunk_index, chunk) in entries.chunks(64).enumerate() {
        let labels = &mut acc.labels;
        for &v in &order {
            labels[v as usize] = 0;
        }
        for (bit, entry) in chunk.iter().enumerate() {
            let node = transit_nodes[entry.transit as usize];
            if W::tight(entry.dist, dist[node as usize]) {
                labels[node as usize] |= 1u64 << bit;
            }
        }

        // Zero-weight edges can make equal-distance nodes depend on each
        // other in either order, so repeat until nothing changes.
        loop {
            let mut changed = false;
            for &u in &order {
                let label = labels[u as usize];
                if label == 0 {
                    continue;
                }
                let mut spread = |v: NodeId, w: W| {
                    if tight_step(u, w, v) && labels[v as usize] | label != labels[v as usize] {
                        labels[v as usize] |= label;
                        changed = true;
                    }
                };
                match direction {
                    Direction::Forward => graph.neighbors_out(u).for_each(|(v, w)| spread(v, w)),
                    Direction::Backward => graph.neighbors_in(u).for_each(|(v, w)| spread(v, w)),
                }
            }
            if !changed {
                break;
            }
        }

        let base = chunk_index * 64;
        for &x in &order {
            let mut label = labels[x as usize];
            let bit = ctx.regions.bit(x);
            while label != 0 {
                let i = label.trailing_zeros() as usize;
                masks[base + i] |= bit;
                label &= label - 1;
            }
        }
    }
    acc.entry_masks.push((root, masks));
}

/// Run every sweep in one direction, returning arc masks and access masks
/// in entry order
fn sweep_all<W: Weight>(ctx: &SweepContext<'_, W>, direction: Direction) -> (Vec<u32>, Vec<u32>) {
    let n = ctx.graph.n_nodes();
    let n_arcs = ctx.tnr.ch().arcs().len();
    let mut sweep = (0..n as NodeId)
        .into_par_iter()
        .fold(
            || Sweep::new(n_arcs, n),
            |mut acc, root| {
                sweep_root(ctx, direction, root, &mut acc);
                acc
            },
        )
        .reduce(Sweep::empty, Sweep::merge);

    if sweep.arc_masks.is_empty() {
        sweep.arc_masks = vec![0; n_arcs];
    }
    sweep.entry_masks.sort_unstable_by_key(|&(node, _)| node);
    let entry_masks = sweep
        .entry_masks
        .into_iter()
        .flat_map(|(_, masks)| masks)
        .collect();
    (sweep.arc_masks, entry_masks)
}

/// Add arc flags to a TNR structure. `graph` must be the graph the
/// hierarchy was built from.
pub fn build_tnraf<W: Weight>(
    graph: &Graph<W>,
    tnr: TransitNodeRouting<W>,
    config: &TnrafConfig,
) -> Result<(TnrArcFlags<W>, TnrafBuildStats)> {
    let n = graph.n_nodes();
    if n != tnr.n_nodes() {
        return Err(Error::invalid_graph(format!(
            "graph has {} nodes but the hierarchy has {}",
            n,
            tnr.n_nodes()
        )));
    }
    let regions = partition(graph, config.region_count)?;
    tracing::info!(nodes = n, regions = regions.n_regions(), "computing arc flags");

    let ch = tnr.ch();
    let mut up_arcs = Vec::new();
    let mut down_arcs = Vec::new();
    for (id, arc) in ch.arcs().iter().enumerate() {
        if !arc.required {
            continue;
        }
        if ch.rank(arc.source) < ch.rank(arc.target) {
            up_arcs.push(id as ArcId);
        } else {
            down_arcs.push(id as ArcId);
        }
    }

    let start = Instant::now();
    let ctx = SweepContext {
        graph,
        tnr: &tnr,
        regions: &regions,
        up_arcs,
        down_arcs,
    };
    let (backward_arcs, forward_access) = sweep_all(&ctx, Direction::Forward);
    tracing::debug!(ms = start.elapsed().as_millis() as u64, "forward sweeps done");
    let (forward_arcs, backward_access) = sweep_all(&ctx, Direction::Backward);
    let sweep_time_ms = start.elapsed().as_millis() as u64;

    let n_required = ctx.up_arcs.len() + ctx.down_arcs.len();
    let bits: u64 = ctx
        .up_arcs
        .iter()
        .map(|&id| forward_arcs[id as usize].count_ones() as u64)
        .chain(ctx.down_arcs.iter().map(|&id| backward_arcs[id as usize].count_ones() as u64))
        .sum();
    let unused_access_entries = forward_access
        .iter()
        .chain(&backward_access)
        .filter(|&&m| m == 0)
        .count() as u64;
    let stats = TnrafBuildStats {
        n_regions: regions.n_regions() as u32,
        region_sizes: regions.sizes(),
        arc_flag_density: if n_required == 0 {
            0.0
        } else {
            bits as f64 / n_required as f64
        },
        unused_access_entries,
        sweep_time_ms,
    };
    tracing::info!(
        density = stats.arc_flag_density,
        unused_access = stats.unused_access_entries,
        ms = stats.sweep_time_ms,
        "arc flags computed"
    );

    let masks = FlagMasks {
        forward_access,
        backward_access,
        forward_arcs,
        backward_arcs,
    };
    let flags = TnrArcFlags::from_parts(tnr, regions, masks)?;
    Ok((flags, stats))
}
