//! Error types for butterfly-distance
//!
//! Library code returns [`Error`]; the binaries wrap it in `anyhow` at the
//! application boundary.

use thiserror::Error;

/// Errors raised while building, loading or querying a distance structure.
///
/// An unreachable pair is not an error: queries return the domain's
/// `INFINITY` sentinel instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input graph (out-of-range endpoint, negative or non-finite
    /// weight, unparsable text). Fatal at build time.
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    /// Corrupt, truncated or mismatched structure or mapping file.
    #[error("Load error: {0}")]
    LoadError(String),

    /// External identifier without a mapping, or internal index out of range.
    #[error("Unknown identifier: {0}")]
    UnknownIdentifier(u64),

    /// Operation not valid in the current lifecycle state.
    #[error("Invalid state: {0}")]
    InvalidState(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    pub(crate) fn invalid_graph(msg: impl Into<String>) -> Self {
        Error::InvalidGraph(msg.into())
    }

    pub(crate) fn load(msg: impl Into<String>) -> Self {
        Error::LoadError(msg.into())
    }

    /// Map an I/O failure during file parsing to `LoadError`, keeping the
    /// path for context.
    pub(crate) fn load_io(path: &std::path::Path, err: std::io::Error) -> Self {
        Error::LoadError(format!("{}: {}", path.display(), err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
