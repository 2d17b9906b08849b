//! Binary id mapping file: external id per internal index
//!
//! ```text
//! header (magic "BDIM") | count u64 | external u64 * count | crc footer
//! ```

use std::path::Path;

use super::codec::{ChecksumReader, ChecksumWriter};
use crate::error::Result;

pub const MAGIC: u32 = 0x4244494D; // "BDIM"
const VERSION: u16 = 1;

pub struct IdMapFile;

impl IdMapFile {
    /// Write `external_ids[internal]` in internal-index order
    pub fn write<P: AsRef<Path>>(path: P, external_ids: &[u64]) -> Result<()> {
        let mut writer = ChecksumWriter::create(path)?;
        writer.header(MAGIC, VERSION, 0)?;
        writer.put_u64(external_ids.len() as u64)?;
        writer.put_u64_slice(external_ids)?;
        writer.finish()
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Vec<u64>> {
        let (mut reader, _) = ChecksumReader::open(path, "id map", MAGIC, VERSION)?;
        let count = reader.get_u64()?;
        let ids = reader.get_u64_vec(count)?;
        reader.finish()?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tempfile::TempDir;

    #[test]
    fn test_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ids.bdim");
        let ids = vec![10_000_000_001u64, 3, u64::MAX];
        IdMapFile::write(&path, &ids).unwrap();
        assert_eq!(IdMapFile::read(&path).unwrap(), ids);
    }

    #[test]
    fn test_truncated_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ids.bdim");
        IdMapFile::write(&path, &[1, 2, 3]).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 20]).unwrap();
        assert!(matches!(IdMapFile::read(&path), Err(Error::LoadError(_))));
    }
}
