//! Tab-separated node/edge tables
//!
//! The input is a directory holding `nodes.csv` (header plus one row per node)
//! and `edges.csv` with at least the columns `u`, `v` and `cost`. Node ids are
//! 0-based row indices and double as external ids; edges are directed.

use std::path::{Path, PathBuf};

use super::{graph_error, LoadedGraph};
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::weight::Weight;

pub const NODES_FILE: &str = "nodes.csv";
pub const EDGES_FILE: &str = "edges.csv";

/// Files that make up a CSV graph directory, in read order
pub fn input_files(dir: &Path) -> Vec<PathBuf> {
    vec![dir.join(NODES_FILE), dir.join(EDGES_FILE)]
}

fn reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| table_error(path, e))
}

/// I/O failures stay I/O errors; everything else is a malformed graph
fn table_error(path: &Path, err: csv::Error) -> Error {
    if err.is_io_error() {
        Error::Csv(err)
    } else {
        graph_error(format!("{}: {}", path.display(), err))
    }
}

fn column(headers: &csv::StringRecord, name: &str, path: &Path) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| graph_error(format!("{}: missing column '{}'", path.display(), name)))
}

pub fn load_graph<W: Weight>(dir: &Path, precision_loss: u32) -> Result<LoadedGraph<W>> {
    let nodes_path = dir.join(NODES_FILE);
    let mut nodes = reader(&nodes_path)?;
    let mut n_nodes = 0usize;
    for record in nodes.records() {
        record.map_err(|e| table_error(&nodes_path, e))?;
        n_nodes += 1;
    }
    tracing::debug!(path = %nodes_path.display(), nodes = n_nodes, "counted nodes");

    let edges_path = dir.join(EDGES_FILE);
    let mut edges_reader = reader(&edges_path)?;
    let headers = edges_reader
        .headers()
        .map_err(|e| table_error(&edges_path, e))?
        .clone();
    let (u_col, v_col, cost_col) = (
        column(&headers, "u", &edges_path)?,
        column(&headers, "v", &edges_path)?,
        column(&headers, "cost", &edges_path)?,
    );

    let mut edges = Vec::new();
    for record in edges_reader.records() {
        let record = record.map_err(|e| table_error(&edges_path, e))?;
        let line = record.position().map_or(0, |p| p.line());
        let field = |col: usize| record.get(col).unwrap_or("");
        let from = field(u_col).parse::<u32>().ok();
        let to = field(v_col).parse::<u32>().ok();
        let cost = W::parse_text(field(cost_col));
        match (from, to, cost) {
            (Some(from), Some(to), Some(cost)) => edges.push((from, to, cost.scale_down(precision_loss))),
            _ => {
                return Err(graph_error(format!(
                    "{} line {}: expected '<u> <v> <cost>', got '{}'",
                    edges_path.display(),
                    line,
                    record.iter().collect::<Vec<_>>().join("\t")
                )))
            }
        }
    }

    let graph = Graph::from_edges(n_nodes, &edges)?;
    Ok(LoadedGraph {
        graph,
        external_ids: (0..n_nodes as u64).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_dir(nodes: &str, edges: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(NODES_FILE), nodes).unwrap();
        std::fs::write(dir.path().join(EDGES_FILE), edges).unwrap();
        dir
    }

    #[test]
    fn test_load_directed_edges() {
        let dir = write_dir(
            "id\tx\ty\n0\t14.4\t50.1\n1\t14.5\t50.1\n2\t14.5\t50.2\n",
            "u\tv\tcost\tname\n0\t1\t120\tmain\n1\t2\t80\tside\n",
        );
        let loaded = load_graph::<u32>(dir.path(), 1).unwrap();
        assert_eq!(loaded.graph.n_nodes(), 3);
        assert_eq!(loaded.external_ids, vec![0, 1, 2]);
        assert_eq!(loaded.graph.edges().collect::<Vec<_>>(), vec![(0, 1, 120), (1, 2, 80)]);
    }

    #[test]
    fn test_columns_found_by_name() {
        let dir = write_dir("id\n0\n1\n", "cost\tv\tu\n7\t0\t1\n");
        let loaded = load_graph::<u32>(dir.path(), 1).unwrap();
        assert_eq!(loaded.graph.edges().collect::<Vec<_>>(), vec![(1, 0, 7)]);
    }

    #[test]
    fn test_precision_loss_and_real_costs() {
        let dir = write_dir("id\n0\n1\n", "u\tv\tcost\n0\t1\t1250\n");
        let scaled = load_graph::<u32>(dir.path(), 100).unwrap();
        assert_eq!(scaled.graph.edges().next(), Some((0, 1, 13)));

        let dir = write_dir("id\n0\n1\n", "u\tv\tcost\n0\t1\t2.75\n");
        let real = load_graph::<f64>(dir.path(), 100).unwrap();
        assert_eq!(real.graph.edges().next(), Some((0, 1, 2.75)));
    }

    #[test]
    fn test_bad_rows_rejected() {
        let dir = write_dir("id\n0\n1\n", "u\tv\n0\t1\n");
        let err = load_graph::<u32>(dir.path(), 1).unwrap_err();
        assert!(err.to_string().contains("missing column 'cost'"));

        let dir = write_dir("id\n0\n1\n", "u\tv\tcost\n0\t1\tfar\n");
        let err = load_graph::<u32>(dir.path(), 1).unwrap_err();
        assert!(matches!(err, Error::InvalidGraph(_)));
        assert!(err.to_string().contains("line 2"));

        // endpoint outside the node table
        let dir = write_dir("id\n0\n1\n", "u\tv\tcost\n0\t5\t1\n");
        assert!(matches!(load_graph::<u32>(dir.path(), 1), Err(Error::InvalidGraph(_))));
    }

    #[test]
    fn test_missing_file_is_io() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(load_graph::<u32>(dir.path(), 1), Err(Error::Csv(_))));
    }
}
