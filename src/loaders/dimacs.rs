//! DIMACS shortest-path challenge format
//!
//! ```text
//! c comment
//! p sp <nodes> <arcs>
//! a <from> <to> <weight>
//! ```
//!
//! Node ids are 1-based in the file and become `id - 1` internally; the
//! original ids are kept as external ids.

use super::{graph_error, LoadedGraph};
use crate::error::Result;
use crate::graph::Graph;
use crate::weight::Weight;

pub fn parse_graph<W: Weight>(text: &str, precision_loss: u32) -> Result<LoadedGraph<W>> {
    let mut n_nodes: Option<usize> = None;
    let mut edges = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line_no = line_no + 1;
        let mut words = line.split_whitespace();
        match words.next() {
            None | Some("c") => continue,
            Some("p") => {
                if n_nodes.is_some() {
                    return Err(graph_error(format!("line {}: duplicate problem line", line_no)));
                }
                let kind = words.next();
                let nodes = words.next().and_then(|w| w.parse::<usize>().ok());
                let arcs = words.next().and_then(|w| w.parse::<usize>().ok());
                match (kind, nodes, arcs) {
                    (Some("sp"), Some(n), Some(m)) => {
                        n_nodes = Some(n);
                        edges.reserve(m);
                    }
                    _ => {
                        return Err(graph_error(format!(
                            "line {}: expected 'p sp <nodes> <arcs>'",
                            line_no
                        )))
                    }
                }
            }
            Some("a") => {
                let n = n_nodes.ok_or_else(|| {
                    graph_error(format!("line {}: arc before problem line", line_no))
                })?;
                let from = words.next().and_then(|w| w.parse::<u64>().ok());
                let to = words.next().and_then(|w| w.parse::<u64>().ok());
                let weight = words.next().and_then(W::parse_text);
                let (from, to, weight) = match (from, to, weight) {
                    (Some(f), Some(t), Some(w)) => (f, t, w),
                    _ => {
                        return Err(graph_error(format!(
                            "line {}: expected 'a <from> <to> <weight>'",
                            line_no
                        )))
                    }
                };
                if from == 0 || to == 0 || from > n as u64 || to > n as u64 {
                    return Err(graph_error(format!(
                        "line {}: arc {} -> {} outside 1..={}",
                        line_no, from, to, n
                    )));
                }
                edges.push(((from - 1) as u32, (to - 1) as u32, weight.scale_down(precision_loss)));
            }
            Some(other) => {
                return Err(graph_error(format!(
                    "line {}: unknown line type '{}'",
                    line_no, other
                )))
            }
        }
    }

    let n_nodes = n_nodes.ok_or_else(|| graph_error("missing problem line".to_string()))?;
    let graph = Graph::from_edges(n_nodes, &edges)?;
    Ok(LoadedGraph {
        graph,
        external_ids: (1..=n_nodes as u64).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const SAMPLE: &str = "c tiny\np sp 3 3\na 1 2 4\na 2 3 6\na 3 1 1\n";

    #[test]
    fn test_parse_one_based() {
        let loaded: LoadedGraph<u32> = parse_graph(SAMPLE, 1).unwrap();
        assert_eq!(loaded.graph.n_nodes(), 3);
        assert_eq!(loaded.graph.edge_weight(0, 1), Some(4));
        assert_eq!(loaded.graph.edge_weight(2, 0), Some(1));
        assert_eq!(loaded.graph.edge_weight(1, 0), None);
        assert_eq!(loaded.external_ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_arc_before_problem_line() {
        let err = parse_graph::<u32>("a 1 2 3\n", 1).unwrap_err();
        assert!(matches!(err, Error::InvalidGraph(_)));
    }

    #[test]
    fn test_zero_id_rejected() {
        let err = parse_graph::<u32>("p sp 2 1\na 0 1 3\n", 1).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_negative_real_weight_rejected() {
        let err = parse_graph::<f64>("p sp 2 1\na 1 2 -3.5\n", 1).unwrap_err();
        assert!(matches!(err, Error::InvalidGraph(_)));
    }

    #[test]
    fn test_missing_problem_line() {
        assert!(parse_graph::<u32>("c nothing\n", 1).is_err());
    }
}
