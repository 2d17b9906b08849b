//! XenGraph text format
//!
//! ```text
//! XGI
//! <nodes> <edges>
//! <from> <to> <weight> <oneway>     (edges lines)
//! ```
//!
//! `oneway == 1` adds only `from -> to`; any other flag adds both directions.
//! Nodes are already dense, so the external id of a node is its index.
//!
//! The companion index file (`XID`, count, one external id per line) maps
//! line position to external id.

use std::path::Path;

use super::{graph_error, LoadedGraph, Tokens};
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::weight::Weight;

pub fn parse_graph<W: Weight>(text: &str, precision_loss: u32) -> Result<LoadedGraph<W>> {
    let mut tokens = Tokens::new(text);

    match tokens.next_token() {
        Some("XGI") => {}
        other => {
            return Err(graph_error(format!(
                "missing XenGraph header 'XGI' (found {:?})",
                other
            )))
        }
    }

    let n_nodes: usize = tokens.parse("node count").map_err(graph_error)?;
    let n_edges: usize = tokens.parse("edge count").map_err(graph_error)?;

    let mut edges = Vec::with_capacity(n_edges * 2);
    for _ in 0..n_edges {
        let from: u32 = tokens.parse("edge source").map_err(graph_error)?;
        let to: u32 = tokens.parse("edge target").map_err(graph_error)?;
        let weight: W = tokens.weight().map_err(graph_error)?;
        let oneway: u32 = tokens.parse("oneway flag").map_err(graph_error)?;

        let weight = weight.scale_down(precision_loss);
        edges.push((from, to, weight));
        if oneway != 1 {
            edges.push((to, from, weight));
        }
    }

    let graph = Graph::from_edges(n_nodes, &edges)?;
    Ok(LoadedGraph {
        graph,
        external_ids: (0..n_nodes as u64).collect(),
    })
}

/// Parse an `XID` index file into `external_ids[internal]`
pub fn parse_xid_mapping(text: &str) -> Result<Vec<u64>> {
    let mut tokens = Tokens::new(text);
    match tokens.next_token() {
        Some("XID") => {}
        other => {
            return Err(Error::load(format!(
                "missing XenGraph index header 'XID' (found {:?})",
                other
            )))
        }
    }

    let count: usize = tokens.parse("node count").map_err(Error::LoadError)?;
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        ids.push(tokens.parse::<u64>("external id").map_err(Error::LoadError)?);
    }
    Ok(ids)
}

pub fn load_xid_mapping<P: AsRef<Path>>(path: P) -> Result<Vec<u64>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| Error::load_io(path, e))?;
    parse_xid_mapping(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "XGI\n4 4\n0 1 10 1\n1 2 5 0\n2 3 7 1\n3 3 1 1\n";

    #[test]
    fn test_parse_oneway_and_twoway() {
        let loaded: LoadedGraph<u32> = parse_graph(SAMPLE, 1).unwrap();
        let g = &loaded.graph;
        assert_eq!(g.n_nodes(), 4);
        assert_eq!(g.edge_weight(0, 1), Some(10));
        assert_eq!(g.edge_weight(1, 0), None);
        assert_eq!(g.edge_weight(1, 2), Some(5));
        assert_eq!(g.edge_weight(2, 1), Some(5));
        // self-loop dropped
        assert_eq!(g.n_edges(), 4);
        assert_eq!(loaded.external_ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_precision_loss() {
        let text = "XGI\n2 1\n0 1 1049 1\n";
        let loaded: LoadedGraph<u32> = parse_graph(text, 100).unwrap();
        assert_eq!(loaded.graph.edge_weight(0, 1), Some(10));
    }

    #[test]
    fn test_real_weights() {
        let text = "XGI\n2 1\n0 1 2.75 1\n";
        let loaded: LoadedGraph<f64> = parse_graph(text, 1).unwrap();
        assert_eq!(loaded.graph.edge_weight(0, 1), Some(2.75));
    }

    #[test]
    fn test_bad_header() {
        let err = parse_graph::<u32>("XGX\n1 0\n", 1).unwrap_err();
        assert!(matches!(err, Error::InvalidGraph(_)));
    }

    #[test]
    fn test_truncated_edges() {
        let err = parse_graph::<u32>("XGI\n3 2\n0 1 4 1\n", 1).unwrap_err();
        assert!(err.to_string().contains("end of input"));
    }

    #[test]
    fn test_endpoint_out_of_range() {
        let err = parse_graph::<u32>("XGI\n2 1\n0 5 4 1\n", 1).unwrap_err();
        assert!(matches!(err, Error::InvalidGraph(_)));
    }

    #[test]
    fn test_xid_mapping() {
        let ids = parse_xid_mapping("XID\n3\n9007199254740993\n42\n7\n").unwrap();
        assert_eq!(ids, vec![9007199254740993, 42, 7]);
        assert!(matches!(
            parse_xid_mapping("XGI\n0\n"),
            Err(Error::LoadError(_))
        ));
    }
}
