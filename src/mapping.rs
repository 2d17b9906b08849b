//! External identifier mapping
//!
//! Callers address nodes by large upstream identifiers (OSM node ids, DIMACS
//! ids); the engine works on dense internal indices. The mapping is built once
//! at load time and never mutated afterwards.

use rustc_hash::FxHashMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::formats::codec::peek_header;
use crate::formats::id_map::{self, IdMapFile};
use crate::graph::NodeId;
use crate::loaders::load_xid_mapping;

/// One-to-one `u64 <-> u32` relation
#[derive(Debug, Clone)]
pub struct IdMapping {
    externals: Vec<u64>,
    index: FxHashMap<u64, NodeId>,
}

impl IdMapping {
    /// Build from `external_ids[internal]`; duplicate externals are rejected
    pub fn new(externals: Vec<u64>) -> Result<Self> {
        if externals.len() >= u32::MAX as usize {
            return Err(Error::load(format!(
                "mapping with {} entries exceeds the u32 index space",
                externals.len()
            )));
        }
        let mut index = FxHashMap::default();
        index.reserve(externals.len());
        for (internal, &external) in externals.iter().enumerate() {
            if let Some(previous) = index.insert(external, internal as NodeId) {
                return Err(Error::load(format!(
                    "external id {} mapped twice (internal {} and {})",
                    external, previous, internal
                )));
            }
        }
        Ok(Self { externals, index })
    }

    /// Load a binary (`BDIM`) or text (`XID`) mapping, detected by content
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let is_binary = matches!(peek_header(path), Ok((magic, _, _)) if magic == id_map::MAGIC);
        let externals = if is_binary {
            IdMapFile::read(path)?
        } else {
            load_xid_mapping(path)?
        };
        tracing::debug!(path = %path.display(), entries = externals.len(), binary = is_binary, "loaded id mapping");
        Self::new(externals)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        IdMapFile::write(path, &self.externals)
    }

    pub fn internal_of(&self, external: u64) -> Result<NodeId> {
        self.index
            .get(&external)
            .copied()
            .ok_or(Error::UnknownIdentifier(external))
    }

    pub fn external_of(&self, internal: NodeId) -> Result<u64> {
        self.externals
            .get(internal as usize)
            .copied()
            .ok_or(Error::UnknownIdentifier(internal as u64))
    }

    pub fn len(&self) -> usize {
        self.externals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.externals.is_empty()
    }

    pub fn externals(&self) -> &[u64] {
        &self.externals
    }
}
