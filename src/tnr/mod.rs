//! Transit Node Routing on top of a contraction hierarchy
//!
//! The `k` highest-ranked nodes are transit nodes. Every node stores the
//! transit nodes its restricted upward search reaches (access nodes) and the
//! non-transit nodes that search settled (search space). A query is local when
//! the forward space of `s` meets the backward space of `t`: only then can the
//! CH shortest path peak below the transit level, so only then do we need the
//! CH search. Everything else is a table lookup over access-node pairs.

mod build;

pub use build::{build_tnr, TnrBuildStats, TnrConfig, TnrMode};

use std::ops::Range;

use crate::ch::{ContractionHierarchy, SearchPool};
use crate::error::{Error, Result};
use crate::graph::NodeId;
use crate::weight::Weight;

pub const NOT_TRANSIT: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccessNode<W> {
    /// Index into the transit node list
    pub transit: u32,
    pub dist: W,
}

/// Access data of one node in one direction
#[derive(Debug, Clone, PartialEq)]
pub struct NodeAccess<W> {
    pub access: Vec<AccessNode<W>>,
    /// Sorted non-transit nodes settled by the restricted upward search
    pub space: Vec<NodeId>,
    /// Largest distance settled inside `space`
    pub radius: W,
}

/// Flattened per-node access data for one direction
#[derive(Debug, Clone, PartialEq)]
pub struct AccessTable<W> {
    offsets: Vec<u64>,
    entries: Vec<AccessNode<W>>,
    space_offsets: Vec<u64>,
    spaces: Vec<NodeId>,
    radius: Vec<W>,
}

impl<W: Weight> AccessTable<W> {
    pub fn from_nodes(nodes: Vec<NodeAccess<W>>) -> Self {
        let mut offsets = Vec::with_capacity(nodes.len() + 1);
        let mut space_offsets = Vec::with_capacity(nodes.len() + 1);
        let mut entries = Vec::new();
        let mut spaces = Vec::new();
        let mut radius = Vec::with_capacity(nodes.len());
        offsets.push(0);
        space_offsets.push(0);
        for node in nodes {
            entries.extend(node.access);
            spaces.extend(node.space);
            radius.push(node.radius);
            offsets.push(entries.len() as u64);
            space_offsets.push(spaces.len() as u64);
        }
        Self {
            offsets,
            entries,
            space_offsets,
            spaces,
            radius,
        }
    }

    /// Reassemble from persisted arrays, checking they are consistent
    pub fn from_raw(
        offsets: Vec<u64>,
        entries: Vec<AccessNode<W>>,
        space_offsets: Vec<u64>,
        spaces: Vec<NodeId>,
        radius: Vec<W>,
        n_nodes: usize,
        n_transit: usize,
    ) -> Result<Self> {
        check_offsets("access offsets", &offsets, n_nodes, entries.len())?;
        check_offsets("search space offsets", &space_offsets, n_nodes, spaces.len())?;
        if radius.len() != n_nodes {
            return Err(Error::load("locality radius count does not match node count"));
        }
        if entries.iter().any(|e| e.transit as usize >= n_transit) {
            return Err(Error::load("access entry references an unknown transit node"));
        }
        if spaces.iter().any(|&v| v as usize >= n_nodes) {
            return Err(Error::load("search space references an unknown node"));
        }
        Ok(Self {
            offsets,
            entries,
            space_offsets,
            spaces,
            radius,
        })
    }

    pub fn n_nodes(&self) -> usize {
        self.radius.len()
    }

    #[inline]
    pub fn entry_range(&self, node: NodeId) -> Range<usize> {
        self.offsets[node as usize] as usize..self.offsets[node as usize + 1] as usize
    }

    #[inline]
    pub fn access(&self, node: NodeId) -> &[AccessNode<W>] {
        &self.entries[self.entry_range(node)]
    }

    #[inline]
    pub fn search_space(&self, node: NodeId) -> &[NodeId] {
        let start = self.space_offsets[node as usize] as usize;
        let end = self.space_offsets[node as usize + 1] as usize;
        &self.spaces[start..end]
    }

    pub fn radius(&self, node: NodeId) -> W {
        self.radius[node as usize]
    }

    pub fn n_entries(&self) -> usize {
        self.entries.len()
    }

    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    pub fn entries(&self) -> &[AccessNode<W>] {
        &self.entries
    }

    pub fn space_offsets(&self) -> &[u64] {
        &self.space_offsets
    }

    pub fn spaces(&self) -> &[NodeId] {
        &self.spaces
    }

    pub fn radii(&self) -> &[W] {
        &self.radius
    }
}

fn check_offsets(what: &str, offsets: &[u64], n_nodes: usize, len: usize) -> Result<()> {
    let monotone = offsets.windows(2).all(|w| w[0] <= w[1]);
    if offsets.len() != n_nodes + 1
        || offsets.first() != Some(&0)
        || offsets.last() != Some(&(len as u64))
        || !monotone
    {
        return Err(Error::load(format!("{} are inconsistent", what)));
    }
    Ok(())
}

/// True when two sorted node lists share an element
pub(crate) fn sorted_intersect(a: &[NodeId], b: &[NodeId]) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => return true,
        }
    }
    false
}

/// Loaded TNR structure
pub struct TransitNodeRouting<W> {
    ch: ContractionHierarchy<W>,
    transit_nodes: Vec<NodeId>,
    transit_index: Vec<u32>,
    table: Vec<W>,
    forward: AccessTable<W>,
    backward: AccessTable<W>,
    pool: SearchPool<W>,
}

impl<W: Weight> TransitNodeRouting<W> {
    pub fn from_parts(
        ch: ContractionHierarchy<W>,
        transit_nodes: Vec<NodeId>,
        table: Vec<W>,
        forward: AccessTable<W>,
        backward: AccessTable<W>,
    ) -> Result<Self> {
        let n = ch.n_nodes();
        let k = transit_nodes.len();
        if table.len() != k * k {
            return Err(Error::load(format!(
                "transit table has {} entries, expected {}",
                table.len(),
                k * k
            )));
        }
        if forward.n_nodes() != n || backward.n_nodes() != n {
            return Err(Error::load("access tables do not cover every node"));
        }
        let mut transit_index = vec![NOT_TRANSIT; n];
        for (i, &node) in transit_nodes.iter().enumerate() {
            let slot = transit_index
                .get_mut(node as usize)
                .ok_or_else(|| Error::load(format!("transit node {} out of range", node)))?;
            if *slot != NOT_TRANSIT {
                return Err(Error::load(format!("transit node {} listed twice", node)));
            }
            *slot = i as u32;
        }
        Ok(Self {
            pool: SearchPool::new(n),
            ch,
            transit_nodes,
            transit_index,
            table,
            forward,
            backward,
        })
    }

    pub fn ch(&self) -> &ContractionHierarchy<W> {
        &self.ch
    }

    pub fn n_nodes(&self) -> usize {
        self.ch.n_nodes()
    }

    pub fn transit_nodes(&self) -> &[NodeId] {
        &self.transit_nodes
    }

    pub fn is_transit(&self, node: NodeId) -> bool {
        self.transit_index[node as usize] != NOT_TRANSIT
    }

    pub fn table(&self) -> &[W] {
        &self.table
    }

    /// `d(transit_nodes[from], transit_nodes[to])`
    #[inline]
    pub fn table_distance(&self, from: u32, to: u32) -> W {
        self.table[from as usize * self.transit_nodes.len() + to as usize]
    }

    pub fn forward(&self) -> &AccessTable<W> {
        &self.forward
    }

    pub fn backward(&self) -> &AccessTable<W> {
        &self.backward
    }

    /// Largest distance `node` can travel (forward, backward) without
    /// touching a transit node
    pub fn locality_radius(&self, node: NodeId) -> (W, W) {
        (self.forward.radius(node), self.backward.radius(node))
    }

    /// Whether the CH shortest path from `s` to `t` may peak below the
    /// transit level
    pub fn is_local(&self, source: NodeId, target: NodeId) -> bool {
        sorted_intersect(
            self.forward.search_space(source),
            self.backward.search_space(target),
        )
    }

    /// Plain CH search, with arc filters
    pub(crate) fn local_distance<F, B>(&self, source: NodeId, target: NodeId, fwd: F, bwd: B) -> W
    where
        F: Fn(u32) -> bool,
        B: Fn(u32) -> bool,
    {
        self.pool
            .with(|state| state.distance_filtered(&self.ch, source, target, fwd, bwd))
    }

    /// Access-pair minimum; filters receive absolute entry indices
    pub(crate) fn global_distance<F, B>(&self, source: NodeId, target: NodeId, fwd: F, bwd: B) -> W
    where
        F: Fn(usize) -> bool,
        B: Fn(usize) -> bool,
    {
        let fwd_range = self.forward.entry_range(source);
        let bwd_range = self.backward.entry_range(target);
        let mut best = W::INFINITY;
        for i in fwd_range {
            if !fwd(i) {
                continue;
            }
            let a = self.forward.entries[i];
            for j in bwd_range.clone() {
                if !bwd(j) {
                    continue;
                }
                let b = self.backward.entries[j];
                let middle = self.table_distance(a.transit, b.transit);
                if middle.is_infinite() {
                    continue;
                }
                best = W::min_of(best, a.dist.plus(middle).plus(b.dist));
            }
        }
        best
    }

    pub fn distance(&self, source: NodeId, target: NodeId) -> W {
        if source == target {
            return W::ZERO;
        }
        if self.is_local(source, target) {
            tracing::trace!(source, target, "local tnr query");
            return self.local_distance(source, target, |_| true, |_| true);
        }
        self.global_distance(source, target, |_| true, |_| true)
    }
}
