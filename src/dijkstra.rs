//! Plain Dijkstra on the original graph
//!
//! Ground truth for validation and the per-node sweeps of arc-flag
//! precomputation.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::graph::{Graph, NodeId};
use crate::weight::{Ordered, Weight};

/// Search direction over the original graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Follow outgoing edges: distances *from* the root
    Forward,
    /// Follow incoming edges: distances *to* the root
    Backward,
}

/// Point-to-point distance, stops as soon as `target` is settled
pub fn shortest_distance<W: Weight>(graph: &Graph<W>, source: NodeId, target: NodeId) -> W {
    if source == target {
        return W::ZERO;
    }
    let n_nodes = graph.n_nodes();
    let mut dist = vec![W::INFINITY; n_nodes];
    let mut heap: BinaryHeap<Reverse<(Ordered<W>, NodeId)>> = BinaryHeap::new();

    dist[source as usize] = W::ZERO;
    heap.push(Reverse((Ordered(W::ZERO), source)));

    while let Some(Reverse((Ordered(d), u))) = heap.pop() {
        if u == target {
            return d;
        }
        if d > dist[u as usize] {
            continue;
        }
        for (v, w) in graph.neighbors_out(u) {
            let new_dist = d.plus(w);
            if new_dist < dist[v as usize] {
                dist[v as usize] = new_dist;
                heap.push(Reverse((Ordered(new_dist), v)));
            }
        }
    }

    dist[target as usize]
}

/// Distances from (`Forward`) or to (`Backward`) `root` for every node
pub fn one_to_all<W: Weight>(graph: &Graph<W>, root: NodeId, direction: Direction) -> Vec<W> {
    let n_nodes = graph.n_nodes();
    let mut dist = vec![W::INFINITY; n_nodes];
    let mut heap: BinaryHeap<Reverse<(Ordered<W>, NodeId)>> = BinaryHeap::new();

    dist[root as usize] = W::ZERO;
    heap.push(Reverse((Ordered(W::ZERO), root)));

    while let Some(Reverse((Ordered(d), u))) = heap.pop() {
        if d > dist[u as usize] {
            continue;
        }
        let mut relax = |v: NodeId, w: W| {
            let new_dist = d.plus(w);
            if new_dist < dist[v as usize] {
                dist[v as usize] = new_dist;
                heap.push(Reverse((Ordered(new_dist), v)));
            }
        };
        match direction {
            Direction::Forward => graph.neighbors_out(u).for_each(|(v, w)| relax(v, w)),
            Direction::Backward => graph.neighbors_in(u).for_each(|(v, w)| relax(v, w)),
        }
    }

    dist
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directed() -> Graph<u32> {
        // 0 -> 1 -> 2 -> 3, shortcut 0 -> 3 expensive, 3 -> 0 back edge
        Graph::from_edges(
            5,
            &[(0, 1, 2), (1, 2, 2), (2, 3, 2), (0, 3, 10), (3, 0, 1)],
        )
        .unwrap()
    }

    #[test]
    fn test_point_to_point() {
        let g = directed();
        assert_eq!(shortest_distance(&g, 0, 3), 6);
        assert_eq!(shortest_distance(&g, 3, 2), 5);
        assert_eq!(shortest_distance(&g, 2, 2), 0);
    }

    #[test]
    fn test_unreachable_is_infinity() {
        let g = directed();
        assert_eq!(shortest_distance(&g, 0, 4), u32::INFINITY);
        assert_eq!(shortest_distance(&g, 4, 0), u32::INFINITY);
    }

    #[test]
    fn test_one_to_all_both_directions() {
        let g = directed();
        let fwd = one_to_all(&g, 0, Direction::Forward);
        assert_eq!(fwd, vec![0, 2, 4, 6, u32::MAX]);

        let bwd = one_to_all(&g, 0, Direction::Backward);
        // distances *to* node 0
        assert_eq!(bwd, vec![0, 5, 3, 1, u32::MAX]);
    }

    #[test]
    fn test_real_weights() {
        let g = Graph::from_edges(3, &[(0, 1, 0.5f64), (1, 2, 0.25), (0, 2, 1.0)]).unwrap();
        assert_eq!(shortest_distance(&g, 0, 2), 0.75);
    }
}
