//! TNR structure file
//!
//! ```text
//! header (magic "BDTN")
//! CH payload (see ch_file)
//! k u32 | transit node u32 * k | table W * k * k
//! forward access, then backward access:
//!   n_entries u64 | offsets u64 * (n + 1) | entry (transit u32, dist W) * n_entries
//!   n_space u64 | space_offsets u64 * (n + 1) | node u32 * n_space
//!   radius W * n
//! crc footer
//! ```

use std::path::Path;

use super::ch_file;
use super::codec::{expect_domain, ChecksumReader, ChecksumWriter};
use crate::error::Result;
use crate::tnr::{AccessNode, AccessTable, TransitNodeRouting};
use crate::weight::Weight;

pub const MAGIC: u32 = 0x4244544E; // "BDTN"
pub const VERSION: u16 = 1;

fn write_access<W: Weight>(writer: &mut ChecksumWriter, table: &AccessTable<W>) -> Result<()> {
    writer.put_u64(table.n_entries() as u64)?;
    writer.put_u64_slice(table.offsets())?;
    for entry in table.entries() {
        writer.put_u32(entry.transit)?;
        writer.put_weight(entry.dist)?;
    }
    writer.put_u64(table.spaces().len() as u64)?;
    writer.put_u64_slice(table.space_offsets())?;
    writer.put_u32_slice(table.spaces())?;
    writer.put_weight_slice(table.radii())
}

fn read_access<W: Weight>(reader: &mut ChecksumReader, n_nodes: usize, n_transit: usize) -> Result<AccessTable<W>> {
    let n_entries = reader.get_u64()?;
    let offsets = reader.get_u64_vec(n_nodes as u64 + 1)?;
    let n_entries = reader.ensure_items(n_entries, 4 + W::BYTES)?;
    let mut entries = Vec::with_capacity(n_entries);
    for _ in 0..n_entries {
        let transit = reader.get_u32()?;
        let dist = reader.get_weight()?;
        entries.push(AccessNode { transit, dist });
    }
    let n_space = reader.get_u64()?;
    let space_offsets = reader.get_u64_vec(n_nodes as u64 + 1)?;
    let spaces = reader.get_u32_vec(n_space)?;
    let radius = reader.get_weight_vec(n_nodes as u64)?;
    AccessTable::from_raw(offsets, entries, space_offsets, spaces, radius, n_nodes, n_transit)
}

pub(crate) fn write_payload<W: Weight>(writer: &mut ChecksumWriter, tnr: &TransitNodeRouting<W>) -> Result<()> {
    ch_file::write_payload(writer, tnr.ch())?;
    writer.put_u32(tnr.transit_nodes().len() as u32)?;
    writer.put_u32_slice(tnr.transit_nodes())?;
    writer.put_weight_slice(tnr.table())?;
    write_access(writer, tnr.forward())?;
    write_access(writer, tnr.backward())
}

pub(crate) fn read_payload<W: Weight>(reader: &mut ChecksumReader) -> Result<TransitNodeRouting<W>> {
    let ch = ch_file::read_payload::<W>(reader)?;
    let n = ch.n_nodes();
    let k = reader.get_u32()? as u64;
    let transit_nodes = reader.get_u32_vec(k)?;
    let table = reader.get_weight_vec(k * k)?;
    let forward = read_access(reader, n, k as usize)?;
    let backward = read_access(reader, n, k as usize)?;
    TransitNodeRouting::from_parts(ch, transit_nodes, table, forward, backward)
}

pub struct TnrFile;

impl TnrFile {
    pub fn write<W: Weight, P: AsRef<Path>>(path: P, tnr: &TransitNodeRouting<W>) -> Result<()> {
        let mut writer = ChecksumWriter::create(path)?;
        writer.header(MAGIC, VERSION, W::DOMAIN.tag())?;
        write_payload(&mut writer, tnr)?;
        writer.finish()
    }

    pub fn read<W: Weight, P: AsRef<Path>>(path: P) -> Result<TransitNodeRouting<W>> {
        let (mut reader, domain) = ChecksumReader::open(path, "TNR structure", MAGIC, VERSION)?;
        expect_domain::<W>("TNR structure", domain)?;
        let tnr = read_payload(&mut reader)?;
        reader.finish()?;
        Ok(tnr)
    }
}
