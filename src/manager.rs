//! Distance query manager
//!
//! Owns one loaded structure (CH, TNR or TNRAF, integer or real) plus an
//! optional id mapping and walks the `Unloaded -> Loaded -> Released`
//! lifecycle. Loading and releasing take the write lock, queries the read
//! lock, so any number of threads may query concurrently.

use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::path::Path;

use crate::ch::{ContractionHierarchy, SearchPool};
use crate::error::{Error, Result};
use crate::formats::codec::peek_header;
use crate::formats::{ChFile, StructureKind, TnrFile, TnrafFile};
use crate::graph::NodeId;
use crate::mapping::IdMapping;
use crate::tnr::TransitNodeRouting;
use crate::tnraf::TnrArcFlags;
use crate::weight::{NumericDomain, Weight};

/// Point-to-point distance oracle over internal indices
pub trait DistanceEngine<W: Weight>: Send + Sync {
    fn n_nodes(&self) -> usize;

    /// Exact distance, `W::INFINITY` when unreachable
    fn distance(&self, source: NodeId, target: NodeId) -> W;

    fn describe(&self) -> StructureInfo;
}

/// Summary of a loaded structure
#[derive(Debug, Clone, Serialize)]
pub struct StructureInfo {
    pub kind: StructureKind,
    pub domain: NumericDomain,
    pub n_nodes: usize,
    pub n_arcs: usize,
    pub n_shortcuts: usize,
    pub n_required_arcs: usize,
    pub n_transit: Option<usize>,
    pub n_access_entries: Option<usize>,
    pub n_regions: Option<usize>,
    pub created_unix: i64,
    pub created: Option<String>,
    pub inputs_sha: String,
}

impl StructureInfo {
    fn from_ch<W: Weight>(kind: StructureKind, ch: &ContractionHierarchy<W>) -> Self {
        let created = chrono::DateTime::<chrono::Utc>::from_timestamp(ch.provenance.created_unix, 0)
            .filter(|_| ch.provenance.created_unix != 0)
            .map(|t| t.to_rfc3339());
        Self {
            kind,
            domain: W::DOMAIN,
            n_nodes: ch.n_nodes(),
            n_arcs: ch.arcs().len(),
            n_shortcuts: ch.n_shortcuts(),
            n_required_arcs: ch.n_required(),
            n_transit: None,
            n_access_entries: None,
            n_regions: None,
            created_unix: ch.provenance.created_unix,
            created,
            inputs_sha: hex::encode(ch.provenance.inputs_sha),
        }
    }

    pub fn print(&self) {
        println!("Structure:        {} ({})", self.kind, self.domain);
        println!("Nodes:            {}", format_number(self.n_nodes as u64));
        println!(
            "Arcs:             {} ({} shortcuts, {} required)",
            format_number(self.n_arcs as u64),
            format_number(self.n_shortcuts as u64),
            format_number(self.n_required_arcs as u64)
        );
        if let Some(k) = self.n_transit {
            println!("Transit nodes:    {}", k);
        }
        if let Some(entries) = self.n_access_entries {
            println!("Access entries:   {}", format_number(entries as u64));
        }
        if let Some(regions) = self.n_regions {
            println!("Regions:          {}", regions);
        }
        match &self.created {
            Some(created) => println!("Created:          {}", created),
            None => println!("Created:          unknown"),
        }
        println!("Input SHA-256:    {}", self.inputs_sha);
    }
}

/// Human-readable count: `1234` -> `1.23K`, `5600000` -> `5.60M`
pub fn format_number(n: u64) -> String {
    if n >= 1_000_000_000 {
        format!("{:.2}B", n as f64 / 1_000_000_000.0)
    } else if n >= 1_000_000 {
        format!("{:.2}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.2}K", n as f64 / 1_000.0)
    } else {
        format!("{}", n)
    }
}

/// CH with its own pool of query states
pub struct ChEngine<W> {
    ch: ContractionHierarchy<W>,
    pool: SearchPool<W>,
}

impl<W: Weight> ChEngine<W> {
    pub fn new(ch: ContractionHierarchy<W>) -> Self {
        Self {
            pool: SearchPool::new(ch.n_nodes()),
            ch,
        }
    }

    pub fn ch(&self) -> &ContractionHierarchy<W> {
        &self.ch
    }
}

impl<W: Weight> DistanceEngine<W> for ChEngine<W> {
    fn n_nodes(&self) -> usize {
        self.ch.n_nodes()
    }

    fn distance(&self, source: NodeId, target: NodeId) -> W {
        self.pool
            .with(|state| state.distance_filtered(&self.ch, source, target, |_| true, |_| true))
    }

    fn describe(&self) -> StructureInfo {
        StructureInfo::from_ch(StructureKind::Ch, &self.ch)
    }
}

impl<W: Weight> DistanceEngine<W> for TransitNodeRouting<W> {
    fn n_nodes(&self) -> usize {
        TransitNodeRouting::n_nodes(self)
    }

    fn distance(&self, source: NodeId, target: NodeId) -> W {
        TransitNodeRouting::distance(self, source, target)
    }

    fn describe(&self) -> StructureInfo {
        let mut info = StructureInfo::from_ch(StructureKind::Tnr, self.ch());
        info.n_transit = Some(self.transit_nodes().len());
        info.n_access_entries = Some(self.forward().n_entries() + self.backward().n_entries());
        info
    }
}

impl<W: Weight> DistanceEngine<W> for TnrArcFlags<W> {
    fn n_nodes(&self) -> usize {
        TnrArcFlags::n_nodes(self)
    }

    fn distance(&self, source: NodeId, target: NodeId) -> W {
        TnrArcFlags::distance(self, source, target)
    }

    fn describe(&self) -> StructureInfo {
        let mut info = self.tnr().describe();
        info.kind = StructureKind::Tnraf;
        info.n_regions = Some(self.regions().n_regions());
        info
    }
}

/// Distance in the domain of the loaded structure
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Distance {
    Integer(u32),
    Real(f64),
}

impl Distance {
    pub fn is_unreachable(&self) -> bool {
        match *self {
            Distance::Integer(d) => d.is_infinite(),
            Distance::Real(d) => d.is_infinite(),
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Distance::Integer(d) => d.as_f64(),
            Distance::Real(d) => d,
        }
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unreachable() {
            return write!(f, "unreachable");
        }
        match self {
            Distance::Integer(d) => write!(f, "{}", d),
            Distance::Real(d) => write!(f, "{}", d),
        }
    }
}

/// A structure of either domain
pub enum LoadedEngine {
    Integer(Box<dyn DistanceEngine<u32>>),
    Real(Box<dyn DistanceEngine<f64>>),
}

impl LoadedEngine {
    pub fn n_nodes(&self) -> usize {
        match self {
            LoadedEngine::Integer(engine) => engine.n_nodes(),
            LoadedEngine::Real(engine) => engine.n_nodes(),
        }
    }

    pub fn distance(&self, source: NodeId, target: NodeId) -> Distance {
        match self {
            LoadedEngine::Integer(engine) => Distance::Integer(engine.distance(source, target)),
            LoadedEngine::Real(engine) => Distance::Real(engine.distance(source, target)),
        }
    }

    pub fn describe(&self) -> StructureInfo {
        match self {
            LoadedEngine::Integer(engine) => engine.describe(),
            LoadedEngine::Real(engine) => engine.describe(),
        }
    }
}

fn load_typed<W: Weight>(path: &Path, kind: StructureKind) -> Result<Box<dyn DistanceEngine<W>>> {
    let engine: Box<dyn DistanceEngine<W>> = match kind {
        StructureKind::Ch => Box::new(ChEngine::new(ChFile::read::<W, _>(path)?)),
        StructureKind::Tnr => Box::new(TnrFile::read::<W, _>(path)?),
        StructureKind::Tnraf => Box::new(TnrafFile::read::<W, _>(path)?),
    };
    Ok(engine)
}

/// Open any structure file, choosing kind and domain from its header
pub fn load_structure<P: AsRef<Path>>(path: P) -> Result<LoadedEngine> {
    let path = path.as_ref();
    let (magic, _, tag) = peek_header(path)?;
    let kind = StructureKind::from_magic(magic).ok_or_else(|| {
        Error::load(format!(
            "{}: not a distance structure (magic 0x{:08X})",
            path.display(),
            magic
        ))
    })?;
    let domain = NumericDomain::from_tag(tag)
        .ok_or_else(|| Error::load(format!("{}: unknown domain tag {}", path.display(), tag)))?;

    let engine = match domain {
        NumericDomain::Integer => LoadedEngine::Integer(load_typed::<u32>(path, kind)?),
        NumericDomain::Real => LoadedEngine::Real(load_typed::<f64>(path, kind)?),
    };
    tracing::info!(path = %path.display(), %kind, %domain, nodes = engine.n_nodes(), "structure loaded");
    Ok(engine)
}

struct Loaded {
    engine: LoadedEngine,
    mapping: Option<IdMapping>,
}

enum State {
    Unloaded,
    Loaded(Loaded),
    Released,
}

/// Lifecycle state as seen by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Unloaded,
    Loaded,
    Released,
}

pub struct DistanceQueryManager {
    state: RwLock<State>,
}

impl Default for DistanceQueryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DistanceQueryManager {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::Unloaded),
        }
    }

    pub fn state(&self) -> ManagerState {
        match *self.state.read() {
            State::Unloaded => ManagerState::Unloaded,
            State::Loaded(_) => ManagerState::Loaded,
            State::Released => ManagerState::Released,
        }
    }

    /// Load a structure and optional mapping. On failure the manager stays
    /// `Unloaded`.
    pub fn initialize<P: AsRef<Path>>(&self, structure: P, mapping: Option<&Path>) -> Result<()> {
        let mut state = self.state.write();
        match *state {
            State::Unloaded => {}
            State::Loaded(_) => return Err(Error::InvalidState("structures already loaded")),
            State::Released => return Err(Error::InvalidState("structures were released")),
        }

        let engine = load_structure(structure)?;
        let mapping = match mapping {
            Some(path) => {
                let mapping = IdMapping::load(path)?;
                if mapping.len() != engine.n_nodes() {
                    return Err(Error::load(format!(
                        "mapping has {} entries but the structure has {} nodes",
                        mapping.len(),
                        engine.n_nodes()
                    )));
                }
                Some(mapping)
            }
            None => None,
        };

        *state = State::Loaded(Loaded { engine, mapping });
        Ok(())
    }

    fn with_loaded<R>(&self, f: impl FnOnce(&Loaded) -> Result<R>) -> Result<R> {
        match &*self.state.read() {
            State::Loaded(loaded) => f(loaded),
            State::Unloaded => Err(Error::InvalidState("no structure loaded")),
            State::Released => Err(Error::InvalidState("structures were released")),
        }
    }

    /// Distance between internal indices
    pub fn distance_query(&self, from: NodeId, to: NodeId) -> Result<Distance> {
        self.with_loaded(|loaded| {
            let n = loaded.engine.n_nodes();
            for id in [from, to] {
                if id as usize >= n {
                    return Err(Error::UnknownIdentifier(id as u64));
                }
            }
            Ok(loaded.engine.distance(from, to))
        })
    }

    /// Distance between external identifiers; needs a mapping
    pub fn distance_query_mapped(&self, from: u64, to: u64) -> Result<Distance> {
        self.with_loaded(|loaded| {
            let mapping = loaded
                .mapping
                .as_ref()
                .ok_or(Error::InvalidState("no id mapping loaded"))?;
            let source = mapping.internal_of(from)?;
            let target = mapping.internal_of(to)?;
            Ok(loaded.engine.distance(source, target))
        })
    }

    pub fn info(&self) -> Result<StructureInfo> {
        self.with_loaded(|loaded| Ok(loaded.engine.describe()))
    }

    pub fn has_mapping(&self) -> bool {
        matches!(&*self.state.read(), State::Loaded(Loaded { mapping: Some(_), .. }))
    }

    /// Drop everything; later queries fail with `InvalidState`
    pub fn clear_structures(&self) {
        let mut state = self.state.write();
        if matches!(*state, State::Loaded(_)) {
            tracing::info!("releasing distance structures");
        }
        *state = State::Released;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ch::{build_ch, ChConfig, Provenance};
    use crate::formats::IdMapFile;
    use crate::graph::Graph;
    use tempfile::TempDir;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_234), "1.23K");
        assert_eq!(format_number(5_600_000), "5.60M");
        assert_eq!(format_number(2_000_000_000), "2.00B");
    }

    fn write_ch(dir: &TempDir) -> std::path::PathBuf {
        let g = Graph::from_edges(4, &[(0, 1, 5u32), (1, 2, 7), (2, 3, 1)]).unwrap();
        let (ch, _) = build_ch(&g, &ChConfig::default(), Provenance::default()).unwrap();
        let path = dir.path().join("line.bdch");
        ChFile::write(&path, &ch).unwrap();
        path
    }

    #[test]
    fn test_lifecycle() {
        let dir = TempDir::new().unwrap();
        let path = write_ch(&dir);
        let manager = DistanceQueryManager::new();

        assert!(matches!(manager.distance_query(0, 1), Err(Error::InvalidState(_))));
        manager.initialize(&path, None).unwrap();
        assert_eq!(manager.state(), ManagerState::Loaded);
        assert_eq!(manager.distance_query(0, 3).unwrap(), Distance::Integer(13));
        assert!(manager.distance_query(3, 0).unwrap().is_unreachable());

        assert!(matches!(manager.initialize(&path, None), Err(Error::InvalidState(_))));

        manager.clear_structures();
        assert_eq!(manager.state(), ManagerState::Released);
        assert!(matches!(manager.distance_query(0, 1), Err(Error::InvalidState(_))));
        assert!(matches!(manager.initialize(&path, None), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_out_of_range_index() {
        let dir = TempDir::new().unwrap();
        let path = write_ch(&dir);
        let manager = DistanceQueryManager::new();
        manager.initialize(&path, None).unwrap();
        assert!(matches!(manager.distance_query(0, 4), Err(Error::UnknownIdentifier(4))));
    }

    #[test]
    fn test_mapped_queries() {
        let dir = TempDir::new().unwrap();
        let path = write_ch(&dir);
        let ids = dir.path().join("line.bdim");
        IdMapFile::write(&ids, &[100, 200, 300, 400]).unwrap();

        let manager = DistanceQueryManager::new();
        manager.initialize(&path, Some(ids.as_path())).unwrap();
        assert!(manager.has_mapping());
        assert_eq!(manager.distance_query_mapped(200, 400).unwrap(), Distance::Integer(8));
        assert!(matches!(manager.distance_query_mapped(200, 999), Err(Error::UnknownIdentifier(999))));
    }

    #[test]
    fn test_mapped_query_without_mapping() {
        let dir = TempDir::new().unwrap();
        let path = write_ch(&dir);
        let manager = DistanceQueryManager::new();
        manager.initialize(&path, None).unwrap();
        assert!(matches!(manager.distance_query_mapped(1, 2), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_failed_initialize_leaves_unloaded() {
        let dir = TempDir::new().unwrap();
        let path = write_ch(&dir);
        let ids = dir.path().join("short.bdim");
        IdMapFile::write(&ids, &[1, 2, 3]).unwrap();

        let manager = DistanceQueryManager::new();
        let err = manager.initialize(&path, Some(ids.as_path())).unwrap_err();
        assert!(matches!(err, Error::LoadError(_)));
        assert_eq!(manager.state(), ManagerState::Unloaded);

        let junk = dir.path().join("junk.bin");
        std::fs::write(&junk, b"not a structure file at all").unwrap();
        assert!(matches!(manager.initialize(&junk, None), Err(Error::LoadError(_))));

        manager.initialize(&path, None).unwrap();
        assert_eq!(manager.state(), ManagerState::Loaded);
    }

    #[test]
    fn test_info_reports_kind() {
        let dir = TempDir::new().unwrap();
        let path = write_ch(&dir);
        let manager = DistanceQueryManager::new();
        manager.initialize(&path, None).unwrap();
        let info = manager.info().unwrap();
        assert_eq!(info.kind, StructureKind::Ch);
        assert_eq!(info.domain, NumericDomain::Integer);
        assert_eq!(info.n_nodes, 4);
        assert!(info.created.is_none());
        assert_eq!(info.inputs_sha, "0".repeat(64));
    }
}
