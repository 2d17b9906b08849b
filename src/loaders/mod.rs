//! Text input loaders
//!
//! Graphs arrive as XenGraph or DIMACS edge lists, or as a directory of
//! tab-separated node/edge tables; query sets and text id mappings use the
//! whitespace-token style. All parse failures surface as
//! [`Error::InvalidGraph`] (graphs, query sets) or [`Error::LoadError`]
//! (mappings) with the offending line number.

pub mod csv_dir;
pub mod dimacs;
pub mod query_set;
pub mod xengraph;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::weight::Weight;

pub use query_set::load_query_set;
pub use xengraph::load_xid_mapping;

/// Supported graph input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GraphFormat {
    Xengraph,
    Dimacs,
    /// Directory with `nodes.csv` and `edges.csv`
    Csv,
}

impl GraphFormat {
    /// Guess the format: a directory is a CSV graph, files go by extension
    pub fn detect<P: AsRef<Path>>(path: P) -> Option<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            return Some(GraphFormat::Csv);
        }
        match path.extension()?.to_str()? {
            "xeng" | "xengraph" => Some(GraphFormat::Xengraph),
            "gr" | "dimacs" => Some(GraphFormat::Dimacs),
            _ => None,
        }
    }

    /// Files read when loading `path` in this format
    pub fn input_files(self, path: &Path) -> Vec<PathBuf> {
        match self {
            GraphFormat::Csv => csv_dir::input_files(path),
            GraphFormat::Xengraph | GraphFormat::Dimacs => vec![path.to_path_buf()],
        }
    }
}

/// A parsed input graph plus the identifiers its nodes had in the source file
#[derive(Debug)]
pub struct LoadedGraph<W> {
    pub graph: Graph<W>,
    /// `external_ids[internal] = id used by the input file`
    pub external_ids: Vec<u64>,
}

/// Load a graph, dividing integer weights by `precision_loss` (1 = unchanged)
pub fn load_graph<W: Weight, P: AsRef<Path>>(
    path: P,
    format: GraphFormat,
    precision_loss: u32,
) -> Result<LoadedGraph<W>> {
    let path = path.as_ref();
    let loaded = match format {
        GraphFormat::Xengraph => xengraph::parse_graph(&std::fs::read_to_string(path)?, precision_loss)?,
        GraphFormat::Dimacs => dimacs::parse_graph(&std::fs::read_to_string(path)?, precision_loss)?,
        GraphFormat::Csv => csv_dir::load_graph(path, precision_loss)?,
    };
    tracing::info!(
        path = %path.display(),
        format = ?format,
        domain = %W::DOMAIN,
        nodes = loaded.graph.n_nodes(),
        edges = loaded.graph.n_edges(),
        "loaded input graph"
    );
    Ok(loaded)
}

/// Whitespace token stream that remembers line numbers
pub(crate) struct Tokens<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    current: Option<(usize, std::str::SplitWhitespace<'a>)>,
    last_line: usize,
}

impl<'a> Tokens<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().enumerate(),
            current: None,
            last_line: 0,
        }
    }

    /// 1-based line of the most recently returned token
    pub(crate) fn line(&self) -> usize {
        self.last_line
    }

    pub(crate) fn next_token(&mut self) -> Option<&'a str> {
        loop {
            if let Some((line_no, words)) = &mut self.current {
                if let Some(word) = words.next() {
                    self.last_line = *line_no + 1;
                    return Some(word);
                }
            }
            let (line_no, line) = self.lines.next()?;
            self.current = Some((line_no, line.split_whitespace()));
        }
    }

    /// Next token parsed as `T`, or a message naming `what` was expected
    pub(crate) fn parse<T: FromStr>(&mut self, what: &str) -> std::result::Result<T, String> {
        let token = self
            .next_token()
            .ok_or_else(|| format!("unexpected end of input, expected {}", what))?;
        token
            .parse()
            .map_err(|_| format!("line {}: expected {}, got '{}'", self.line(), what, token))
    }

    pub(crate) fn weight<W: Weight>(&mut self) -> std::result::Result<W, String> {
        let token = self
            .next_token()
            .ok_or_else(|| "unexpected end of input, expected weight".to_string())?;
        W::parse_text(token)
            .ok_or_else(|| format!("line {}: expected weight, got '{}'", self.line(), token))
    }
}

pub(crate) fn graph_error(msg: String) -> Error {
    Error::InvalidGraph(msg)
}
