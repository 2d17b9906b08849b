//! TNR precomputation
//!
//! 1. Transit nodes: the `k` highest ranks of the hierarchy.
//! 2. Table: `k * k` CH queries, one rayon task per row. `Dm` mode reads it
//!    from a full distance matrix of the original graph instead.
//! 3. Access nodes: per node and direction, an upward search that records
//!    transit nodes without expanding them. `Slow` and `Dm` drop access nodes
//!    whose recorded distance is not the true distance, checked by CH query
//!    or matrix lookup respectively.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::{AccessNode, AccessTable, NodeAccess, TransitNodeRouting, NOT_TRANSIT};
use crate::ch::{upward_search, ChAdjacency, ContractionHierarchy, QueryState, SearchState};
use crate::error::{Error, Result};
use crate::graph::NodeId;
use crate::matrix::DistanceMatrix;
use crate::weight::Weight;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TnrMode {
    /// Keep every access node the upward search reaches
    Fast,
    /// Verify access-node distances with CH queries and drop dominated ones
    Slow,
    /// Same result as `Slow`, checked against an all-pairs distance matrix.
    /// Needs `n * n` weights of memory.
    Dm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TnrConfig {
    /// Number of transit nodes (clamped to the node count)
    pub transit_count: usize,
    pub mode: TnrMode,
}

impl Default for TnrConfig {
    fn default() -> Self {
        Self {
            transit_count: 1000,
            mode: TnrMode::Slow,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TnrBuildStats {
    pub n_transit: u32,
    pub table_unreachable: u64,
    pub forward_access_entries: u64,
    pub backward_access_entries: u64,
    pub dropped_access_entries: u64,
    pub local_space_entries: u64,
    pub table_time_ms: u64,
    pub access_time_ms: u64,
}

/// Source of exact distances for access-node verification
enum Exact<'a, W> {
    Unchecked,
    Query(&'a ContractionHierarchy<W>, &'a mut QueryState<W>),
    Matrix(&'a DistanceMatrix<W>),
}

impl<W: Weight> Exact<'_, W> {
    fn distance(&mut self, source: NodeId, target: NodeId) -> Option<W> {
        match self {
            Exact::Unchecked => None,
            Exact::Query(ch, query) => {
                Some(query.distance_filtered(*ch, source, target, |_| true, |_| true))
            }
            Exact::Matrix(matrix) => Some(matrix.get(source, target)),
        }
    }
}

fn exact_source<'a, W: Weight>(
    mode: TnrMode,
    ch: &'a ContractionHierarchy<W>,
    matrix: Option<&'a DistanceMatrix<W>>,
    query: &'a mut QueryState<W>,
) -> Exact<'a, W> {
    match (mode, matrix) {
        (TnrMode::Fast, _) => Exact::Unchecked,
        (_, Some(matrix)) => Exact::Matrix(matrix),
        (_, None) => Exact::Query(ch, query),
    }
}

/// One node's access data in one direction plus the number of dropped entries
fn node_access<W: Weight>(
    adjacency: &ChAdjacency<W>,
    search: &mut SearchState<W>,
    mut exact: Exact<'_, W>,
    forward: bool,
    transit_nodes: &[NodeId],
    transit_index: &[u32],
    node: NodeId,
) -> (NodeAccess<W>, u64) {
    let result = upward_search(adjacency, search, node, |v| {
        transit_index[v as usize] != NOT_TRANSIT
    });

    let mut dropped = 0u64;
    let mut access: Vec<AccessNode<W>> = Vec::with_capacity(result.stops.len());
    for (transit, dist) in result.stops {
        let index = transit_index[transit as usize];
        let (source, target) = if forward {
            (node, transit_nodes[index as usize])
        } else {
            (transit_nodes[index as usize], node)
        };
        if let Some(true_dist) = exact.distance(source, target) {
            if !W::tight(dist, true_dist) {
                dropped += 1;
                continue;
            }
        }
        access.push(AccessNode { transit: index, dist });
    }
    access.sort_unstable_by_key(|a| a.transit);

    let radius = result
        .settled
        .iter()
        .fold(W::ZERO, |acc, &(_, d)| W::max_of(acc, d));
    let mut space: Vec<NodeId> = result.settled.into_iter().map(|(v, _)| v).collect();
    space.sort_unstable();

    (NodeAccess { access, space, radius }, dropped)
}

/// Precompute TNR over a finished hierarchy
pub fn build_tnr<W: Weight>(
    ch: ContractionHierarchy<W>,
    config: &TnrConfig,
) -> Result<(TransitNodeRouting<W>, TnrBuildStats)> {
    let n = ch.n_nodes();
    if config.transit_count == 0 && n > 0 {
        return Err(Error::invalid_graph("transit node count must be positive"));
    }
    let k = config.transit_count.min(n);
    let transit_nodes: Vec<NodeId> = ch.nodes_by_rank_desc().into_iter().take(k).collect();
    let mut transit_index = vec![NOT_TRANSIT; n];
    for (i, &node) in transit_nodes.iter().enumerate() {
        transit_index[node as usize] = i as u32;
    }

    tracing::info!(nodes = n, transit = k, mode = ?config.mode, "building transit node routing");

    let table_start = Instant::now();
    let matrix = match config.mode {
        TnrMode::Dm => Some(DistanceMatrix::compute(&ch.original_graph()?)?),
        TnrMode::Fast | TnrMode::Slow => None,
    };
    let table: Vec<W> = match &matrix {
        Some(matrix) => transit_nodes
            .iter()
            .flat_map(|&from| transit_nodes.iter().map(move |&to| matrix.get(from, to)))
            .collect(),
        None => transit_nodes
            .par_iter()
            .map_init(
                || QueryState::new(n),
                |query, &from| {
                    transit_nodes
                        .iter()
                        .map(|&to| query.distance_filtered(&ch, from, to, |_| true, |_| true))
                        .collect::<Vec<W>>()
                },
            )
            .flatten()
            .collect(),
    };
    let table_time_ms = table_start.elapsed().as_millis() as u64;
    let table_unreachable = table.iter().filter(|d| d.is_infinite()).count() as u64;
    tracing::debug!(entries = table.len(), unreachable = table_unreachable, ms = table_time_ms, "transit table computed");

    let access_start = Instant::now();
    let per_node: Vec<(NodeAccess<W>, NodeAccess<W>, u64)> = (0..n as NodeId)
        .into_par_iter()
        .map_init(
            || (SearchState::new(n), QueryState::new(n)),
            |(search, query), node| {
                let (fwd, dropped_fwd) = node_access(
                    ch.up(),
                    search,
                    exact_source(config.mode, &ch, matrix.as_ref(), query),
                    true,
                    &transit_nodes,
                    &transit_index,
                    node,
                );
                let (bwd, dropped_bwd) = node_access(
                    ch.down(),
                    search,
                    exact_source(config.mode, &ch, matrix.as_ref(), query),
                    false,
                    &transit_nodes,
                    &transit_index,
                    node,
                );
                (fwd, bwd, dropped_fwd + dropped_bwd)
            },
        )
        .collect();
    drop(matrix);
    let access_time_ms = access_start.elapsed().as_millis() as u64;

    let mut forward_nodes = Vec::with_capacity(n);
    let mut backward_nodes = Vec::with_capacity(n);
    let mut dropped_access_entries = 0u64;
    for (fwd, bwd, dropped) in per_node {
        forward_nodes.push(fwd);
        backward_nodes.push(bwd);
        dropped_access_entries += dropped;
    }
    let forward = AccessTable::from_nodes(forward_nodes);
    let backward = AccessTable::from_nodes(backward_nodes);

    let stats = TnrBuildStats {
        n_transit: k as u32,
        table_unreachable,
        forward_access_entries: forward.n_entries() as u64,
        backward_access_entries: backward.n_entries() as u64,
        dropped_access_entries,
        local_space_entries: (forward.spaces().len() + backward.spaces().len()) as u64,
        table_time_ms,
        access_time_ms,
    };
    tracing::info!(
        forward_access = stats.forward_access_entries,
        backward_access = stats.backward_access_entries,
        dropped = stats.dropped_access_entries,
        ms = stats.table_time_ms + stats.access_time_ms,
        "transit node routing built"
    );

    let tnr = TransitNodeRouting::from_parts(ch, transit_nodes, table, forward, backward)?;
    Ok((tnr, stats))
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
            .map(|_| (rng.random_range(0..n), rng.random_range(0..n), rng.random_range(1..50)))
            .collect();
        Graph::from_edges(n as usize, &edges).unwrap()
    }

    fn build(g: &Graph<u32>, k: usize, mode: TnrMode) -> TransitNodeRouting<u32> {
        let (ch, _) = build_ch(g, &ChConfig::default(), Provenance::default()).unwrap();
        build_tnr(ch, &TnrConfig { transit_count: k, mode }).unwrap().0
    }

    #[test]
    fn test_exact_in_every_mode() {
        let g = random_graph(70, 280, 21);
        for mode in [TnrMode::Fast, TnrMode::Slow, TnrMode::Dm] {
            let tnr = build(&g, 10, mode);
            for s in 0..70 {
                for t in 0..70 {
                    assert_eq!(tnr.distance(s, t), shortest_distance(&g, s, t), "{:?} {} -> {}", mode, s, t);
                }
            }
        }
    }

    #[test]
    fn test_dm_mode_matches_query_modes() {
        let g = random_graph(80, 320, 8);
        let (ch, _) = build_ch(&g, &ChConfig::default(), Provenance::default()).unwrap();
        let config = |mode| TnrConfig { transit_count: 12, mode };
        let (fast, _) = build_tnr(ch.clone(), &config(TnrMode::Fast)).unwrap();
        let (slow, slow_stats) = build_tnr(ch.clone(), &config(TnrMode::Slow)).unwrap();
        let (dm, dm_stats) = build_tnr(ch, &config(TnrMode::Dm)).unwrap();

        assert_eq!(dm.transit_nodes(), fast.transit_nodes());
        assert_eq!(dm.table(), fast.table());
        assert_eq!(dm.table(), slow.table());
        // both verified modes keep exactly the same access nodes
        assert_eq!(dm.forward(), slow.forward());
        assert_eq!(dm.backward(), slow.backward());
        assert_eq!(dm_stats.dropped_access_entries, slow_stats.dropped_access_entries);
    }

    #[test]
    fn test_dm_mode_serde_name() {
        let parsed: TnrConfig = serde_json::from_str(r#"{"mode":"dm"}"#).unwrap();
        assert_eq!(parsed.mode, TnrMode::Dm);
        assert_eq!(parsed.transit_count, 1000);
    }

    #[test]
    fn test_transit_nodes_are_top_ranks() {
        let g = random_graph(40, 150, 4);
        let tnr = build(&g, 5, TnrMode::Slow);
        let n = tnr.n_nodes() as u32;
        for &t in tnr.transit_nodes() {
            assert!(tnr.ch().rank(t) >= n - 5);
            assert!(tnr.is_transit(t));
            // a transit node is its own only access node
            assert_eq!(tnr.forward().access(t).len(), 1);
            assert_eq!(tnr.forward().access(t)[0].dist, 0);
            assert!(tnr.forward().search_space(t).is_empty());
        }
    }

    #[test]
    fn test_table_is_asymmetric_on_directed_graph() {
        // ring 0 -> 1 -> 2 -> 3 -> 0
        let g = Graph::from_edges(4, &[(0, 1, 1u32), (1, 2, 1), (2, 3, 1), (3, 0, 1)]).unwrap();
        let tnr = build(&g, 4, TnrMode::Fast);
        for i in 0..4u32 {
            for j in 0..4u32 {
                let (a, b) = (tnr.transit_nodes()[i as usize], tnr.transit_nodes()[j as usize]);
                assert_eq!(tnr.table_distance(i, j), shortest_distance(&g, a, b));
            }
        }
        assert_eq!(tnr.distance(0, 3), 3);
        assert_eq!(tnr.distance(3, 0), 1);
    }

    #[test]
    fn test_transit_count_clamped_and_zero_rejected() {
        let g = random_graph(10, 30, 1);
        let tnr = build(&g, 50, TnrMode::Fast);
        assert_eq!(tnr.transit_nodes().len(), 10);

        let (ch, _) = build_ch(&g, &ChConfig::default(), Provenance::default()).unwrap();
        let err = build_tnr(ch, &TnrConfig { transit_count: 0, mode: TnrMode::Fast });
        assert!(matches!(err, Err(Error::InvalidGraph(_))));
    }

    #[test]
    fn test_locality_radius_covers_space() {
        let g = random_graph(50, 200, 13);
        let tnr = build(&g, 6, TnrMode::Slow);
        for v in 0..50 {
            let (fwd, _) = tnr.locality_radius(v);
            for &u in tnr.forward().search_space(v) {
                assert!(shortest_distance(&g, v, u) <= fwd);
            }
        }
    }
}
