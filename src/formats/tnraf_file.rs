//! TNRAF structure file
//!
//! ```text
//! header (magic "BDTA")
//! TNR payload (see tnr_file)
//! n_regions u8 | region u8 * n
//! forward access mask u32 * n_forward_entries
//! backward access mask u32 * n_backward_entries
//! forward arc mask u32 * n_arcs | backward arc mask u32 * n_arcs
//! crc footer
//! ```

use std::path::Path;

use super::codec::{expect_domain, ChecksumReader, ChecksumWriter};
use super::tnr_file;
use crate::error::Result;
use crate::tnraf::{FlagMasks, Regions, TnrArcFlags};
use crate::weight::Weight;

pub const MAGIC: u32 = 0x42445441; // "BDTA"
pub const VERSION: u16 = 1;

pub struct TnrafFile;

impl TnrafFile {
    pub fn write<W: Weight, P: AsRef<Path>>(path: P, flags: &TnrArcFlags<W>) -> Result<()> {
        let mut writer = ChecksumWriter::create(path)?;
        writer.header(MAGIC, VERSION, W::DOMAIN.tag())?;
        tnr_file::write_payload(&mut writer, flags.tnr())?;

        let regions = flags.regions();
        writer.put_u8(regions.n_regions() as u8)?;
        writer.put_bytes(regions.assignment())?;
        let masks = flags.masks();
        writer.put_u32_slice(&masks.forward_access)?;
        writer.put_u32_slice(&masks.backward_access)?;
        writer.put_u32_slice(&masks.forward_arcs)?;
        writer.put_u32_slice(&masks.backward_arcs)?;
        writer.finish()
    }

    pub fn read<W: Weight, P: AsRef<Path>>(path: P) -> Result<TnrArcFlags<W>> {
        let (mut reader, domain) = ChecksumReader::open(path, "TNRAF structure", MAGIC, VERSION)?;
        expect_domain::<W>("TNRAF structure", domain)?;
        let tnr = tnr_file::read_payload::<W>(&mut reader)?;

        let n_regions = reader.get_u8()?;
        let assignment = reader.get_u8_vec(tnr.n_nodes() as u64)?;
        let regions = Regions::from_assignment(n_regions, assignment)?;
        let n_arcs = tnr.ch().arcs().len() as u64;
        let masks = FlagMasks {
            forward_access: reader.get_u32_vec(tnr.forward().n_entries() as u64)?,
            backward_access: reader.get_u32_vec(tnr.backward().n_entries() as u64)?,
            forward_arcs: reader.get_u32_vec(n_arcs)?,
            backward_arcs: reader.get_u32_vec(n_arcs)?,
        };
        reader.finish()?;
        TnrArcFlags::from_parts(tnr, regions, masks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ch::{build_ch, ChConfig, Provenance};
    use crate::error::Error;
    use crate::graph::Graph;
    use crate::tnr::{build_tnr, TnrConfig};
    use crate::tnraf::{build_tnraf, TnrafConfig};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use tempfile::TempDir;

    fn sample() -> TnrArcFlags<u32> {
        let mut rng = StdRng::seed_from_u64(44);
        let edges: Vec<(u32, u32, u32)> = (0..150)
            .map(|_| (rng.random_range(0..45), rng.random_range(0..45), rng.random_range(1..30)))
            .collect();
        let g = Graph::from_edges(45, &edges).unwrap();
        let (ch, _) = build_ch(&g, &ChConfig::default(), Provenance::default()).unwrap();
        let config = TnrafConfig {
            tnr: TnrConfig {
                transit_count: 5,
                ..TnrConfig::default()
            },
            region_count: 4,
        };
        let (tnr, _) = build_tnr(ch, &config.tnr).unwrap();
        build_tnraf(&g, tnr, &config).unwrap().0
    }

    #[test]
    fn test_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("graph.bdta");
        let flags = sample();
        TnrafFile::write(&path, &flags).unwrap();

        let loaded: TnrArcFlags<u32> = TnrafFile::read(&path).unwrap();
        assert_eq!(loaded.regions(), flags.regions());
        assert_eq!(loaded.masks(), flags.masks());
        for s in 0..45 {
            for t in 0..45 {
                assert_eq!(loaded.distance(s, t), flags.distance(s, t));
            }
        }
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("graph.bdta");
        TnrafFile::write(&path, &sample()).unwrap();
        let mut bytes = std::fs::read(&path).unwrap();
        // append junk but keep a valid footer so only the length check trips
        let body_len = bytes.len() - 16;
        let mut body = bytes[..body_len].to_vec();
        body.extend_from_slice(&[0, 0, 0, 0]);
        let crc = crate::formats::crc::checksum(&body);
        body.extend_from_slice(&crc.to_le_bytes());
        body.extend_from_slice(&crc.to_le_bytes());
        bytes = body;
        std::fs::write(&path, &bytes).unwrap();
        match TnrafFile::read::<u32, _>(&path) {
            Err(Error::LoadError(msg)) => assert!(msg.contains("trailing")),
            _ => panic!("expected trailing bytes to be rejected"),
        }
    }
}
