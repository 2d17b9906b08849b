//! CH structure file
//!
//! ```text
//! header (magic "BDCH")
//! n_nodes u32 | n_arcs u64 | created_unix i64 | inputs_sha [32]
//! rank u32 * n_nodes
//! arc * n_arcs: source u32 | target u32 | weight W | flags u8 | middle u32 | part_a u32 | part_b u32
//! crc footer
//! ```
//!
//! The payload functions are shared with the TNR and TNRAF files, which embed
//! the hierarchy verbatim.

use std::path::Path;

use super::codec::{expect_domain, ChecksumReader, ChecksumWriter};
use crate::ch::{ArcKind, ChArc, ContractionHierarchy, Provenance, NO_NODE};
use crate::error::{Error, Result};
use crate::weight::Weight;

pub const MAGIC: u32 = 0x42444348; // "BDCH"
pub const VERSION: u16 = 1;

const FLAG_REQUIRED: u8 = 1;
const FLAG_SHORTCUT: u8 = 2;

pub(crate) fn write_payload<W: Weight>(writer: &mut ChecksumWriter, ch: &ContractionHierarchy<W>) -> Result<()> {
    writer.put_u32(ch.n_nodes() as u32)?;
    writer.put_u64(ch.arcs().len() as u64)?;
    writer.put_i64(ch.provenance.created_unix)?;
    writer.put_bytes(&ch.provenance.inputs_sha)?;
    writer.put_u32_slice(ch.ranks())?;
    for arc in ch.arcs() {
        let mut flags = 0u8;
        if arc.required {
            flags |= FLAG_REQUIRED;
        }
        let (middle, parts) = match arc.kind {
            ArcKind::Original => (NO_NODE, [NO_NODE, NO_NODE]),
            ArcKind::Shortcut { middle, parts } => {
                flags |= FLAG_SHORTCUT;
                (middle, parts)
            }
        };
        writer.put_u32(arc.source)?;
        writer.put_u32(arc.target)?;
        writer.put_weight(arc.weight)?;
        writer.put_u8(flags)?;
        writer.put_u32(middle)?;
        writer.put_u32(parts[0])?;
        writer.put_u32(parts[1])?;
    }
    Ok(())
}

pub(crate) fn read_payload<W: Weight>(reader: &mut ChecksumReader) -> Result<ContractionHierarchy<W>> {
    let n_nodes = reader.get_u32()?;
    let n_arcs = reader.get_u64()?;
    let provenance = Provenance {
        created_unix: reader.get_i64()?,
        inputs_sha: reader.get_array32()?,
    };
    let ranks = reader.get_u32_vec(n_nodes as u64)?;

    let arc_bytes = 4 + 4 + W::BYTES + 1 + 4 + 4 + 4;
    let n_arcs = reader.ensure_items(n_arcs, arc_bytes)?;
    let mut arcs = Vec::with_capacity(n_arcs);
    for id in 0..n_arcs {
        let source = reader.get_u32()?;
        let target = reader.get_u32()?;
        let weight = reader.get_weight::<W>()?;
        let flags = reader.get_u8()?;
        let middle = reader.get_u32()?;
        let parts = [reader.get_u32()?, reader.get_u32()?];
        if flags & !(FLAG_REQUIRED | FLAG_SHORTCUT) != 0 {
            return Err(Error::load(format!("arc {} has unknown flags 0x{:02X}", id, flags)));
        }
        let kind = if flags & FLAG_SHORTCUT != 0 {
            ArcKind::Shortcut { middle, parts }
        } else {
            ArcKind::Original
        };
        arcs.push(ChArc {
            source,
            target,
            weight,
            kind,
            required: flags & FLAG_REQUIRED != 0,
        });
    }

    ContractionHierarchy::from_parts(ranks, arcs, provenance)
}

pub struct ChFile;

impl ChFile {
    pub fn write<W: Weight, P: AsRef<Path>>(path: P, ch: &ContractionHierarchy<W>) -> Result<()> {
        let mut writer = ChecksumWriter::create(path)?;
        writer.header(MAGIC, VERSION, W::DOMAIN.tag())?;
        write_payload(&mut writer, ch)?;
        writer.finish()
    }

    pub fn read<W: Weight, P: AsRef<Path>>(path: P) -> Result<ContractionHierarchy<W>> {
        let (mut reader, domain) = ChecksumReader::open(path, "CH structure", MAGIC, VERSION)?;
        expect_domain::<W>("CH structure", domain)?;
        let ch = read_payload(&mut reader)?;
        reader.finish()?;
        Ok(ch)
    }
}
