//! Query-set files: a count followed by that many `from to` pairs

use std::path::Path;

use super::{graph_error, Tokens};
use crate::error::Result;

pub fn parse_query_set(text: &str) -> Result<Vec<(u64, u64)>> {
    let mut tokens = Tokens::new(text);
    let count: usize = tokens.parse("query count").map_err(graph_error)?;
    let mut pairs = Vec::with_capacity(count);
    for _ in 0..count {
        let from: u64 = tokens.parse("query source").map_err(graph_error)?;
        let to: u64 = tokens.parse("query target").map_err(graph_error)?;
        pairs.push((from, to));
    }
    Ok(pairs)
}

pub fn load_query_set<P: AsRef<Path>>(path: P) -> Result<Vec<(u64, u64)>> {
    let text = std::fs::read_to_string(path)?;
    parse_query_set(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs() {
        let pairs = parse_query_set("3\n1 2\n3 4\n18446744073709551615 0\n").unwrap();
        assert_eq!(pairs, vec![(1, 2), (3, 4), (u64::MAX, 0)]);
    }

    #[test]
    fn test_short_file() {
        assert!(parse_query_set("2\n1 2\n").is_err());
    }
}
