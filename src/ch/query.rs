//! Bidirectional CH query
//!
//! Forward search from `s` over upward arcs, backward search from `t` over
//! reversed downward arcs. Each direction stops once its queue minimum cannot
//! improve the best meeting distance. Arc filters let TNRAF prune arcs whose
//! region flags exclude the target without touching the search itself.
//!
//! Search state is version-stamped so resetting between queries is O(1).

use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::{ArcId, ChAdjacency, ContractionHierarchy};
use crate::graph::NodeId;
use crate::weight::{Ordered, Weight};

/// Version-stamped distance entry
#[derive(Clone, Copy)]
struct DistEntry<W> {
    dist: W,
    version: u32,
}

/// Reusable single-direction search state
pub struct SearchState<W> {
    dist: Vec<DistEntry<W>>,
    version: u32,
    heap: BinaryHeap<Reverse<(Ordered<W>, NodeId)>>,
}

impl<W: Weight> SearchState<W> {
    pub fn new(n_nodes: usize) -> Self {
        Self {
            dist: vec![
                DistEntry {
                    dist: W::INFINITY,
                    version: 0
                };
                n_nodes
            ],
            version: 0,
            heap: BinaryHeap::with_capacity(256),
        }
    }

    #[inline(always)]
    fn reset(&mut self) {
        self.version = self.version.wrapping_add(1);
        if self.version == 0 {
            // Version wrapped, need full reset
            for entry in &mut self.dist {
                entry.version = 0;
            }
            self.version = 1;
        }
        self.heap.clear();
    }

    #[inline(always)]
    pub fn get_dist(&self, node: NodeId) -> W {
        let entry = &self.dist[node as usize];
        if entry.version == self.version {
            entry.dist
        } else {
            W::INFINITY
        }
    }

    #[inline(always)]
    fn set_dist(&mut self, node: NodeId, dist: W) {
        self.dist[node as usize] = DistEntry {
            dist,
            version: self.version,
        };
    }

    fn start(&mut self, root: NodeId) {
        self.reset();
        self.set_dist(root, W::ZERO);
        self.heap.push(Reverse((Ordered(W::ZERO), root)));
    }

    #[inline(always)]
    fn peek_min(&self) -> W {
        self.heap
            .peek()
            .map(|Reverse((Ordered(d), _))| *d)
            .unwrap_or(W::INFINITY)
    }

    /// Pop the next non-stale entry
    fn pop_settled(&mut self) -> Option<(W, NodeId)> {
        while let Some(Reverse((Ordered(d), node))) = self.heap.pop() {
            if d > self.get_dist(node) {
                continue;
            }
            return Some((d, node));
        }
        None
    }

    #[inline(always)]
    fn relax<F: Fn(ArcId) -> bool>(&mut self, adj: &ChAdjacency<W>, node: NodeId, d: W, allow: &F) {
        for (next, w, arc) in adj.neighbors(node) {
            if !allow(arc) {
                continue;
            }
            let new_dist = d.plus(w);
            if new_dist < self.get_dist(next) {
                self.set_dist(next, new_dist);
                self.heap.push(Reverse((Ordered(new_dist), next)));
            }
        }
    }
}

/// Forward and backward state for one bidirectional query
pub struct QueryState<W> {
    pub forward: SearchState<W>,
    pub backward: SearchState<W>,
}

impl<W: Weight> QueryState<W> {
    pub fn new(n_nodes: usize) -> Self {
        Self {
            forward: SearchState::new(n_nodes),
            backward: SearchState::new(n_nodes),
        }
    }

    /// Exact `s -> t` distance, `W::INFINITY` when unreachable.
    ///
    /// `fwd_allow` / `bwd_allow` veto arcs by id; pass `|_| true` for plain CH.
    pub fn distance_filtered<F, B>(
        &mut self,
        ch: &ContractionHierarchy<W>,
        source: NodeId,
        target: NodeId,
        fwd_allow: F,
        bwd_allow: B,
    ) -> W
    where
        F: Fn(ArcId) -> bool,
        B: Fn(ArcId) -> bool,
    {
        if source == target {
            return W::ZERO;
        }

        self.forward.start(source);
        self.backward.start(target);
        let mut best = W::INFINITY;

        loop {
            let fwd_min = self.forward.peek_min();
            let bwd_min = self.backward.peek_min();
            let fwd_active = fwd_min < best;
            let bwd_active = bwd_min < best;
            if !fwd_active && !bwd_active {
                break;
            }

            if fwd_active && (!bwd_active || fwd_min <= bwd_min) {
                let Some((d, node)) = self.forward.pop_settled() else {
                    continue;
                };
                let other = self.backward.get_dist(node);
                best = W::min_of(best, d.plus(other));
                self.forward.relax(ch.up(), node, d, &fwd_allow);
            } else {
                let Some((d, node)) = self.backward.pop_settled() else {
                    continue;
                };
                let other = self.forward.get_dist(node);
                best = W::min_of(best, d.plus(other));
                self.backward.relax(ch.down(), node, d, &bwd_allow);
            }
        }

        tracing::trace!(source, target, distance = %best, "ch query");
        best
    }
}

/// CH query bound to one hierarchy with its own scratch state
pub struct ChQuery<'a, W> {
    ch: &'a ContractionHierarchy<W>,
    state: QueryState<W>,
}

impl<'a, W: Weight> ChQuery<'a, W> {
    pub fn new(ch: &'a ContractionHierarchy<W>) -> Self {
        Self {
            ch,
            state: QueryState::new(ch.n_nodes()),
        }
    }

    pub fn distance(&mut self, source: NodeId, target: NodeId) -> W {
        self.state
            .distance_filtered(self.ch, source, target, |_| true, |_| true)
    }
}

/// Pool of query states shared by concurrent `&self` queries
pub struct SearchPool<W> {
    n_nodes: usize,
    free: Mutex<Vec<QueryState<W>>>,
}

impl<W: Weight> SearchPool<W> {
    pub fn new(n_nodes: usize) -> Self {
        Self {
            n_nodes,
            free: Mutex::new(Vec::new()),
        }
    }

    /// Run `f` with a pooled state, allocating one if none is free
    pub fn with<R>(&self, f: impl FnOnce(&mut QueryState<W>) -> R) -> R {
        let pooled = self.free.lock().pop();
        let mut state = pooled.unwrap_or_else(|| QueryState::new(self.n_nodes));
        let result = f(&mut state);
        self.free.lock().push(state);
        result
    }
}

/// Result of an upward search that stops at stop nodes
#[derive(Debug, Default)]
pub struct UpwardSearch<W> {
    /// Stop nodes reached, with their distances from the root
    pub stops: Vec<(NodeId, W)>,
    /// Settled non-stop nodes (root included unless it is a stop node)
    pub settled: Vec<(NodeId, W)>,
}

/// Exhaustive upward search from `root` in `direction` (`up` for forward,
/// `down` for backward). Nodes for which `is_stop` holds are recorded but
/// never expanded.
pub fn upward_search<W: Weight, S: Fn(NodeId) -> bool>(
    adjacency: &ChAdjacency<W>,
    state: &mut SearchState<W>,
    root: NodeId,
    is_stop: S,
) -> UpwardSearch<W> {
    let mut result = UpwardSearch {
        stops: Vec::new(),
        settled: Vec::new(),
    };
    state.start(root);
    while let Some((d, node)) = state.pop_settled() {
        if is_stop(node) {
            result.stops.push((node, d));
            continue;
        }
        result.settled.push((node, d));
        state.relax(adjacency, node, d, &|_| true);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ch::{build_ch, ChConfig, Provenance};
    use crate::dijkstra::shortest_distance;
    use crate::graph::Graph;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_graph(n: u32, m: usize, seed: u64) -> Graph<u32> {
        let mut rng = StdRng::seed_from_u64(seed);
        let edges: Vec<(u32, u32, u32)> = (0..m)
            .map(|_| (rng.random_range(0..n), rng.random_range(0..n), rng.random_range(1..100)))
            .collect();
        Graph::from_edges(n as usize, &edges).unwrap()
    }

    #[test]
    fn test_matches_dijkstra_on_directed_graph() {
        let g = random_graph(80, 320, 11);
        let (ch, _) = build_ch(&g, &ChConfig::default(), Provenance::default()).unwrap();
        let mut query = ChQuery::new(&ch);
        for s in 0..80 {
            for t in 0..80 {
                assert_eq!(query.distance(s, t), shortest_distance(&g, s, t), "{} -> {}", s, t);
            }
        }
    }

    #[test]
    fn test_reflexive_and_unreachable() {
        let g = Graph::from_edges(4, &[(0, 1, 3u32), (1, 2, 4)]).unwrap();
        let (ch, _) = build_ch(&g, &ChConfig::default(), Provenance::default()).unwrap();
        let mut query = ChQuery::new(&ch);
        for v in 0..4 {
            assert_eq!(query.distance(v, v), 0);
        }
        assert_eq!(query.distance(0, 2), 7);
        assert_eq!(query.distance(2, 0), u32::INFINITY);
        assert_eq!(query.distance(0, 3), u32::INFINITY);
    }

    #[test]
    fn test_real_weights_within_tolerance() {
        let mut rng = StdRng::seed_from_u64(5);
        let edges: Vec<(u32, u32, f64)> = (0..250)
            .map(|_| (rng.random_range(0..60), rng.random_range(0..60), rng.random_range(0.0..10.0)))
            .collect();
        let g = Graph::from_edges(60, &edges).unwrap();
        let (ch, _) = build_ch(&g, &ChConfig::default(), Provenance::default()).unwrap();
        let mut query = ChQuery::new(&ch);
        for s in 0..60 {
            for t in 0..60 {
                let expected = shortest_distance(&g, s, t);
                let got = query.distance(s, t);
                assert!(f64::tight(got, expected), "{} -> {}: {} vs {}", s, t, got, expected);
            }
        }
    }

    #[test]
    fn test_pool_reuses_states() {
        let g = random_graph(30, 100, 2);
        let (ch, _) = build_ch(&g, &ChConfig::default(), Provenance::default()).unwrap();
        let pool = SearchPool::new(ch.n_nodes());
        let a = pool.with(|state| state.distance_filtered(&ch, 0, 7, |_| true, |_| true));
        let b = pool.with(|state| state.distance_filtered(&ch, 0, 7, |_| true, |_| true));
        assert_eq!(a, b);
        assert_eq!(pool.free.lock().len(), 1);
    }

    #[test]
    fn test_upward_search_stops_at_stop_nodes() {
        let g = random_graph(40, 160, 8);
        let (ch, _) = build_ch(&g, &ChConfig::default(), Provenance::default()).unwrap();
        let top = ch.nodes_by_rank_desc()[0];
        let mut state = SearchState::new(ch.n_nodes());
        for root in 0..40 {
            let result = upward_search(ch.up(), &mut state, root, |v| v == top);
            assert!(result.settled.iter().all(|&(v, _)| v != top));
            assert!(result.stops.len() <= 1);
            if root != top {
                assert_eq!(result.settled[0], (root, 0));
            }
        }
    }
}
