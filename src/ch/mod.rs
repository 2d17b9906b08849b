//! Contraction Hierarchies
//!
//! Offline, [`build_ch`] contracts nodes one at a time in priority order and
//! inserts shortcuts where no witness path exists. Online, [`ChQuery`] runs a
//! bidirectional search that only ever climbs in rank.
//!
//! Every arc (original or shortcut) lives in one arena. A shortcut references
//! the two arcs it replaces by arena index, so the hierarchy is a DAG of
//! indices with no ownership cycles and persists as a flat table.

mod builder;
mod query;
mod witness;

pub use builder::{build_ch, ChBuildStats, ChConfig, WitnessMode};
pub use query::{upward_search, ChQuery, QueryState, SearchPool, SearchState, UpwardSearch};
pub use witness::{WitnessLimits, WitnessSearch};

use crate::error::{Error, Result};
use crate::graph::{Graph, NodeId};
use crate::weight::Weight;

/// Index into the arc arena
pub type ArcId = u32;

pub const NO_NODE: u32 = u32::MAX;

/// What an arena arc stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcKind {
    Original,
    /// `source -> middle -> target`, replacing arcs `parts[0]` and `parts[1]`
    Shortcut { middle: NodeId, parts: [ArcId; 2] },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChArc<W> {
    pub source: NodeId,
    pub target: NodeId,
    pub weight: W,
    pub kind: ArcKind,
    /// Used at query time. Cleared when a strictly shorter shortcut
    /// supersedes the arc.
    pub required: bool,
}

impl<W> ChArc<W> {
    pub fn is_shortcut(&self) -> bool {
        matches!(self.kind, ArcKind::Shortcut { .. })
    }
}

/// Build provenance recorded in structure headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Provenance {
    pub created_unix: i64,
    pub inputs_sha: [u8; 32],
}

/// Flat rank-restricted adjacency: `(head, weight, arc id)` per node
#[derive(Debug, Clone)]
pub struct ChAdjacency<W> {
    offsets: Vec<u64>,
    heads: Vec<u32>,
    weights: Vec<W>,
    arc_ids: Vec<ArcId>,
}

impl<W: Weight> ChAdjacency<W> {
    fn from_pairs(n_nodes: usize, mut items: Vec<(u32, u32, W, ArcId)>) -> Self {
        items.sort_unstable_by_key(|&(tail, head, _, _)| (tail, head));
        let mut offsets = vec![0u64; n_nodes + 1];
        for &(tail, _, _, _) in &items {
            offsets[tail as usize + 1] += 1;
        }
        for i in 0..n_nodes {
            offsets[i + 1] += offsets[i];
        }
        Self {
            offsets,
            heads: items.iter().map(|&(_, h, _, _)| h).collect(),
            weights: items.iter().map(|&(_, _, w, _)| w).collect(),
            arc_ids: items.iter().map(|&(_, _, _, id)| id).collect(),
        }
    }

    #[inline(always)]
    pub fn neighbors(&self, node: NodeId) -> impl Iterator<Item = (NodeId, W, ArcId)> + '_ {
        let start = self.offsets[node as usize] as usize;
        let end = self.offsets[node as usize + 1] as usize;
        (start..end).map(move |i| (self.heads[i], self.weights[i], self.arc_ids[i]))
    }

    pub fn len(&self) -> usize {
        self.heads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }
}

/// Contracted graph: node ranks, the arc arena and the two upward adjacencies
#[derive(Debug, Clone)]
pub struct ContractionHierarchy<W> {
    ranks: Vec<u32>,
    arcs: Vec<ChArc<W>>,
    /// For `u`: required arcs `u -> v` with `rank[v] > rank[u]`
    up: ChAdjacency<W>,
    /// For `v`: required arcs `u -> v` with `rank[u] > rank[v]`, stored as `v -> u`
    down: ChAdjacency<W>,
    pub provenance: Provenance,
}

impl<W: Weight> ContractionHierarchy<W> {
    /// Assemble from ranks and arena, validating both
    pub fn from_parts(ranks: Vec<u32>, arcs: Vec<ChArc<W>>, provenance: Provenance) -> Result<Self> {
        let n = ranks.len();
        if n >= u32::MAX as usize {
            return Err(Error::load("node count exceeds the u32 index space"));
        }

        let mut seen = vec![false; n];
        for (node, &rank) in ranks.iter().enumerate() {
            let slot = seen.get_mut(rank as usize).ok_or_else(|| {
                Error::load(format!("rank {} of node {} is out of range", rank, node))
            })?;
            if *slot {
                return Err(Error::load(format!("rank {} assigned twice", rank)));
            }
            *slot = true;
        }

        let mut up = Vec::new();
        let mut down = Vec::new();
        for (id, arc) in arcs.iter().enumerate() {
            if arc.source as usize >= n || arc.target as usize >= n || arc.source == arc.target {
                return Err(Error::load(format!(
                    "arc {} ({} -> {}) has invalid endpoints",
                    id, arc.source, arc.target
                )));
            }
            if !arc.weight.is_valid_edge_weight() {
                return Err(Error::load(format!("arc {} has invalid weight {}", id, arc.weight)));
            }
            if let ArcKind::Shortcut { middle, parts } = arc.kind {
                if middle as usize >= n || parts.iter().any(|&p| p as usize >= id) {
                    return Err(Error::load(format!("shortcut {} has dangling references", id)));
                }
            }
            if !arc.required {
                continue;
            }
            let id = id as ArcId;
            if ranks[arc.source as usize] < ranks[arc.target as usize] {
                up.push((arc.source, arc.target, arc.weight, id));
            } else {
                down.push((arc.target, arc.source, arc.weight, id));
            }
        }

        Ok(Self {
            up: ChAdjacency::from_pairs(n, up),
            down: ChAdjacency::from_pairs(n, down),
            ranks,
            arcs,
            provenance,
        })
    }

    pub fn n_nodes(&self) -> usize {
        self.ranks.len()
    }

    pub fn rank(&self, node: NodeId) -> u32 {
        self.ranks[node as usize]
    }

    pub fn ranks(&self) -> &[u32] {
        &self.ranks
    }

    pub fn arcs(&self) -> &[ChArc<W>] {
        &self.arcs
    }

    pub fn arc(&self, id: ArcId) -> &ChArc<W> {
        &self.arcs[id as usize]
    }

    pub fn up(&self) -> &ChAdjacency<W> {
        &self.up
    }

    pub fn down(&self) -> &ChAdjacency<W> {
        &self.down
    }

    pub fn n_shortcuts(&self) -> usize {
        self.arcs.iter().filter(|a| a.is_shortcut()).count()
    }

    pub fn n_required(&self) -> usize {
        self.up.len() + self.down.len()
    }

    /// Nodes ordered from highest rank to lowest
    pub fn nodes_by_rank_desc(&self) -> Vec<NodeId> {
        let mut order = vec![0u32; self.ranks.len()];
        for (node, &rank) in self.ranks.iter().enumerate() {
            order[self.ranks.len() - 1 - rank as usize] = node as NodeId;
        }
        order
    }

    /// Expand an arc into the original arcs it stands for, in path order
    pub fn unpack_arc(&self, id: ArcId, out: &mut Vec<ArcId>) {
        let mut stack = vec![id];
        while let Some(top) = stack.pop() {
            match self.arcs[top as usize].kind {
                ArcKind::Original => out.push(top),
                ArcKind::Shortcut { parts, .. } => {
                    stack.push(parts[1]);
                    stack.push(parts[0]);
                }
            }
        }
    }

    /// Rebuild the input graph from the original arcs of the arena
    pub fn original_graph(&self) -> Result<Graph<W>> {
        let edges: Vec<(NodeId, NodeId, W)> = self
            .arcs
            .iter()
            .filter(|a| !a.is_shortcut())
            .map(|a| (a.source, a.target, a.weight))
            .collect();
        Graph::from_edges(self.n_nodes(), &edges)
    }

    /// Convenience one-off query (allocates search state)
    pub fn distance(&self, source: NodeId, target: NodeId) -> W {
        ChQuery::new(self).distance(source, target)
    }
}
