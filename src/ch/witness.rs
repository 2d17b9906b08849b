//! Bounded witness search used while contracting a node
//!
//! A witness is a path `u -> ... -> w` avoiding the node being contracted whose
//! cost does not exceed the shortcut `u -> v -> w`. The search is cut off by a
//! hop limit, a settled-node limit and a cost limit. Stopping early only ever
//! loses witnesses, which costs extra shortcuts but never correctness.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::builder::Overlay;
use crate::graph::NodeId;
use crate::weight::{Ordered, Weight};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessLimits {
    /// Maximum number of arcs on a witness path
    pub hop_limit: u32,
    /// Maximum number of nodes settled per search
    pub settled_limit: usize,
}

impl WitnessLimits {
    pub const DEEP: WitnessLimits = WitnessLimits {
        hop_limit: 4,
        settled_limit: 1000,
    };

    pub const SHALLOW: WitnessLimits = WitnessLimits {
        hop_limit: 2,
        settled_limit: 100,
    };
}

/// Reusable witness Dijkstra
pub struct WitnessSearch<W> {
    dist: FxHashMap<NodeId, (W, u32)>,
    heap: BinaryHeap<Reverse<(Ordered<W>, NodeId)>>,
}

impl<W: Weight> Default for WitnessSearch<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Weight> WitnessSearch<W> {
    pub fn new() -> Self {
        Self {
            dist: FxHashMap::default(),
            heap: BinaryHeap::new(),
        }
    }

    /// Search from `source` over uncontracted overlay arcs, never entering
    /// `avoid` and never exceeding `max_cost`
    pub(super) fn run(
        &mut self,
        overlay: &Overlay<W>,
        source: NodeId,
        avoid: NodeId,
        max_cost: W,
        limits: WitnessLimits,
    ) {
        self.dist.clear();
        self.heap.clear();

        self.dist.insert(source, (W::ZERO, 0));
        self.heap.push(Reverse((Ordered(W::ZERO), source)));
        let mut settled = 0usize;

        while let Some(Reverse((Ordered(d), node))) = self.heap.pop() {
            let (best, hops) = match self.dist.get(&node) {
                Some(&entry) => entry,
                None => continue,
            };
            if d > best {
                continue;
            }
            if d > max_cost {
                break;
            }
            settled += 1;
            if settled > limits.settled_limit {
                break;
            }
            if hops >= limits.hop_limit {
                continue;
            }

            for (next, w) in overlay.out_arcs(node) {
                if next == avoid {
                    continue;
                }
                let new_dist = d.plus(w);
                if new_dist > max_cost {
                    continue;
                }
                let improves = match self.dist.get(&next) {
                    Some(&(old, _)) => new_dist < old,
                    None => true,
                };
                if improves {
                    self.dist.insert(next, (new_dist, hops + 1));
                    self.heap.push(Reverse((Ordered(new_dist), next)));
                }
            }
        }
    }

    /// Best cost found to `node` (tentative labels count: each is a real path)
    pub fn distance(&self, node: NodeId) -> W {
        self.dist.get(&node).map(|&(d, _)| d).unwrap_or(W::INFINITY)
    }
}
