//! Region partition by round-robin BFS growth
//!
//! Seeds are spread evenly over the node id space (`i * n / k`). Each round,
//! every region claims the next unassigned node from its frontier queue,
//! treating edges as undirected. A region whose frontier runs dry claims the
//! lowest unassigned node instead, so disconnected graphs still end with
//! every node assigned.

use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::graph::{Graph, NodeId};
use crate::weight::Weight;

/// Region masks are `u32`, one bit per region
pub const MAX_REGIONS: usize = 32;

const UNASSIGNED: u8 = u8::MAX;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Regions {
    n_regions: u8,
    region_of: Vec<u8>,
}

impl Regions {
    pub fn from_assignment(n_regions: u8, region_of: Vec<u8>) -> Result<Self> {
        if n_regions as usize > MAX_REGIONS {
            return Err(Error::load(format!("{} regions exceed the maximum of {}", n_regions, MAX_REGIONS)));
        }
        if let Some(&bad) = region_of.iter().find(|&&r| r >= n_regions) {
            return Err(Error::load(format!("region {} out of range (have {})", bad, n_regions)));
        }
        Ok(Self { n_regions, region_of })
    }

    pub fn n_regions(&self) -> usize {
        self.n_regions as usize
    }

    #[inline]
    pub fn region(&self, node: NodeId) -> u8 {
        self.region_of[node as usize]
    }

    #[inline]
    pub fn bit(&self, node: NodeId) -> u32 {
        1u32 << self.region_of[node as usize]
    }

    pub fn assignment(&self) -> &[u8] {
        &self.region_of
    }

    /// Node count per region
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.n_regions as usize];
        for &r in &self.region_of {
            sizes[r as usize] += 1;
        }
        sizes
    }
}

/// Partition `graph` into `requested` regions (clamped to `1..=32` and to the
/// node count)
pub fn partition<W: Weight>(graph: &Graph<W>, requested: usize) -> Result<Regions> {
    let n = graph.n_nodes();
    if requested == 0 {
        return Err(Error::invalid_graph("region count must be positive"));
    }
    if requested > MAX_REGIONS {
        return Err(Error::invalid_graph(format!(
            "region count {} exceeds the maximum of {}",
            requested, MAX_REGIONS
        )));
    }
    let k = requested.min(n);
    if k == 0 {
        return Ok(Regions {
            n_regions: 0,
            region_of: Vec::new(),
        });
    }

    let mut region_of = vec![UNASSIGNED; n];
    let mut queues: Vec<VecDeque<NodeId>> = vec![VecDeque::new(); k];
    let mut unassigned = n;
    let mut scan_cursor = 0usize;
    let per_region = n / k;

    let claim = |node: NodeId,
                 region: usize,
                 region_of: &mut Vec<u8>,
                 queue: &mut VecDeque<NodeId>,
                 unassigned: &mut usize| {
        region_of[node as usize] = region as u8;
        *unassigned -= 1;
        queue.extend(graph.neighbors_out(node).map(|(v, _)| v));
        queue.extend(graph.neighbors_in(node).map(|(v, _)| v));
    };

    for (region, queue) in queues.iter_mut().enumerate() {
        let seed = (per_region * region) as NodeId;
        claim(seed, region, &mut region_of, queue, &mut unassigned);
    }

    while unassigned > 0 {
        for (region, queue) in queues.iter_mut().enumerate() {
            if unassigned == 0 {
                break;
            }
            let mut next = None;
            while let Some(candidate) = queue.pop_front() {
                if region_of[candidate as usize] == UNASSIGNED {
                    next = Some(candidate);
                    break;
                }
            }
            let node = match next {
                Some(node) => node,
                None => {
                    while region_of[scan_cursor] != UNASSIGNED {
                        scan_cursor += 1;
                    }
                    scan_cursor as NodeId
                }
            };
            claim(node, region, &mut region_of, queue, &mut unassigned);
        }
    }

    let regions = Regions {
        n_regions: k as u8,
        region_of,
    };
    tracing::debug!(regions = k, sizes = ?regions.sizes(), "graph partitioned");
    Ok(regions)
}
