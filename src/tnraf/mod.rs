//! TNR with arc flags
//!
//! The graph is cut into at most 32 regions. Every CH arc and every access
//! entry carries a `u32` mask: bit `r` is set when the arc (or access node)
//! lies on some shortest path towards (forward) or from (backward) a node of
//! region `r`. Queries only look at arcs and access entries flagged for the
//! other endpoint's region; the answer is unchanged because every arc of the
//! optimal CH path keeps its bit.

mod build;
mod regions;

pub use build::{build_tnraf, TnrafBuildStats, TnrafConfig};
pub use regions::{partition, Regions, MAX_REGIONS};

use crate::error::{Error, Result};
use crate::graph::NodeId;
use crate::tnr::TransitNodeRouting;
use crate::weight::Weight;

/// Region masks for every access entry and CH arc
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagMasks {
    /// Per forward access entry: regions of targets it serves
    pub forward_access: Vec<u32>,
    /// Per backward access entry: regions of sources it serves
    pub backward_access: Vec<u32>,
    /// Per arena arc, for upward arcs of the forward search
    pub forward_arcs: Vec<u32>,
    /// Per arena arc, for downward arcs of the backward search
    pub backward_arcs: Vec<u32>,
}

pub struct TnrArcFlags<W> {
    tnr: TransitNodeRouting<W>,
    regions: Regions,
    masks: FlagMasks,
}

impl<W: Weight> TnrArcFlags<W> {
    pub fn from_parts(tnr: TransitNodeRouting<W>, regions: Regions, masks: FlagMasks) -> Result<Self> {
        if regions.assignment().len() != tnr.n_nodes() {
            return Err(Error::load("region assignment does not cover every node"));
        }
        if masks.forward_access.len() != tnr.forward().n_entries()
            || masks.backward_access.len() != tnr.backward().n_entries()
        {
            return Err(Error::load("access flag count does not match access entries"));
        }
        let n_arcs = tnr.ch().arcs().len();
        if masks.forward_arcs.len() != n_arcs || masks.backward_arcs.len() != n_arcs {
            return Err(Error::load("arc flag count does not match arc count"));
        }
        Ok(Self { tnr, regions, masks })
    }

    pub fn tnr(&self) -> &TransitNodeRouting<W> {
        &self.tnr
    }

    pub fn regions(&self) -> &Regions {
        &self.regions
    }

    pub fn masks(&self) -> &FlagMasks {
        &self.masks
    }

    pub fn n_nodes(&self) -> usize {
        self.tnr.n_nodes()
    }

    pub fn distance(&self, source: NodeId, target: NodeId) -> W {
        if source == target {
            return W::ZERO;
        }
        let source_bit = self.regions.bit(source);
        let target_bit = self.regions.bit(target);
        let masks = &self.masks;

        if self.tnr.is_local(source, target) {
            return self.tnr.local_distance(
                source,
                target,
                |arc| masks.forward_arcs[arc as usize] & target_bit != 0,
                |arc| masks.backward_arcs[arc as usize] & source_bit != 0,
            );
        }
        self.tnr.global_distance(
            source,
            target,
            |i| masks.forward_access[i] & target_bit != 0,
            |j| masks.backward_access[j] & source_bit != 0,
        )
    }
}
