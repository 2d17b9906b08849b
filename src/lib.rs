//! Point-to-point shortest-path distances on large directed graphs.
//!
//! Three query structures share one contraction hierarchy:
//!
//! - [`ch`]: Contraction Hierarchies, bidirectional upward search
//! - [`tnr`]: Transit Node Routing, table lookups for long-range queries
//! - [`tnraf`]: TNR with region arc flags pruning both query paths
//!
//! Structures are built offline from a text graph, written to checksummed
//! binary files ([`formats`]) and served through [`DistanceQueryManager`].
//! Every structure lives in exactly one numeric domain (`u32` or `f64`).

pub mod ch;
pub mod dijkstra;
pub mod error;
pub mod formats;
pub mod graph;
pub mod loaders;
pub mod manager;
pub mod mapping;
pub mod matrix;
pub mod tnr;
pub mod tnraf;
pub mod validate;
pub mod weight;

pub use ch::{build_ch, ChConfig, ContractionHierarchy, Provenance};
pub use error::{Error, Result};
pub use graph::{Graph, NodeId};
pub use manager::{load_structure, Distance, DistanceEngine, DistanceQueryManager, LoadedEngine, ManagerState};
pub use mapping::IdMapping;
pub use matrix::DistanceMatrix;
pub use tnr::{build_tnr, TnrConfig, TransitNodeRouting};
pub use tnraf::{build_tnraf, TnrArcFlags, TnrafConfig};
pub use weight::{NumericDomain, Weight};
