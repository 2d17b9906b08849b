//! Shared little-endian framing for structure and mapping files
//!
//! Layout of every file:
//!
//! ```text
//! magic u32 | version u16 | domain u8 | reserved u8 | payload ... | body_crc u64 | body_crc u64
//! ```
//!
//! Every byte before the footer feeds the CRC-64 digest. Readers load the
//! whole file, verify the footer, then decode the payload from a bounds-checked
//! cursor, so truncation and corruption both surface as `LoadError`.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::crc;
use crate::error::{Error, Result};
use crate::weight::{NumericDomain, Weight};

pub const HEADER_LEN: usize = 8;
pub const FOOTER_LEN: usize = 16;

/// Buffered file writer that checksums everything it writes
pub struct ChecksumWriter {
    writer: BufWriter<File>,
    digest: crc::Digest,
    scratch: Vec<u8>,
}

impl ChecksumWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            writer: BufWriter::new(File::create(path)?),
            digest: crc::Digest::new(),
            scratch: Vec::with_capacity(16),
        })
    }

    /// Magic, version, domain tag and reserved byte
    pub fn header(&mut self, magic: u32, version: u16, domain: u8) -> Result<()> {
        self.put_u32(magic)?;
        self.put_u16(version)?;
        self.put_u8(domain)?;
        self.put_u8(0)
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        self.digest.update(bytes);
        Ok(())
    }

    pub fn put_u8(&mut self, v: u8) -> Result<()> {
        self.put_bytes(&[v])
    }

    pub fn put_u16(&mut self, v: u16) -> Result<()> {
        self.put_bytes(&v.to_le_bytes())
    }

    pub fn put_u32(&mut self, v: u32) -> Result<()> {
        self.put_bytes(&v.to_le_bytes())
    }

    pub fn put_u64(&mut self, v: u64) -> Result<()> {
        self.put_bytes(&v.to_le_bytes())
    }

    pub fn put_i64(&mut self, v: i64) -> Result<()> {
        self.put_bytes(&v.to_le_bytes())
    }

    pub fn put_weight<W: Weight>(&mut self, w: W) -> Result<()> {
        self.scratch.clear();
        w.encode(&mut self.scratch);
        self.writer.write_all(&self.scratch)?;
        self.digest.update(&self.scratch);
        Ok(())
    }

    pub fn put_u32_slice(&mut self, values: &[u32]) -> Result<()> {
        for &v in values {
            self.put_u32(v)?;
        }
        Ok(())
    }

    pub fn put_u64_slice(&mut self, values: &[u64]) -> Result<()> {
        for &v in values {
            self.put_u64(v)?;
        }
        Ok(())
    }

    pub fn put_weight_slice<W: Weight>(&mut self, values: &[W]) -> Result<()> {
        for &v in values {
            self.put_weight(v)?;
        }
        Ok(())
    }

    /// Write the CRC footer and flush
    pub fn finish(mut self) -> Result<()> {
        let body_crc = self.digest.finalize();
        let file_crc = body_crc;
        self.writer.write_all(&body_crc.to_le_bytes())?;
        self.writer.write_all(&file_crc.to_le_bytes())?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Verified in-memory view of a file body
pub struct ChecksumReader {
    what: &'static str,
    body: Vec<u8>,
    pos: usize,
}

impl ChecksumReader {
    /// Read `path`, verify the CRC footer, and check magic and version.
    /// Returns the reader positioned after the 8-byte header plus the raw
    /// domain tag.
    pub fn open<P: AsRef<Path>>(
        path: P,
        what: &'static str,
        magic: u32,
        version: u16,
    ) -> Result<(Self, u8)> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| Error::load_io(path, e))?;
        Self::from_bytes(bytes, what, magic, version)
    }

    pub fn from_bytes(
        mut bytes: Vec<u8>,
        what: &'static str,
        magic: u32,
        version: u16,
    ) -> Result<(Self, u8)> {
        if bytes.len() < HEADER_LEN + FOOTER_LEN {
            return Err(Error::load(format!(
                "{} is truncated: {} bytes",
                what,
                bytes.len()
            )));
        }

        let found_magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if found_magic != magic {
            return Err(Error::load(format!(
                "Invalid magic in {}: expected 0x{:08X}, got 0x{:08X}",
                what, magic, found_magic
            )));
        }
        let found_version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if found_version != version {
            return Err(Error::load(format!(
                "Unsupported {} version: expected {}, got {}",
                what, version, found_version
            )));
        }

        let body_len = bytes.len() - FOOTER_LEN;
        let mut footer = [0u8; 8];
        footer.copy_from_slice(&bytes[body_len..body_len + 8]);
        let stored_crc = u64::from_le_bytes(footer);
        let computed_crc = crc::checksum(&bytes[..body_len]);
        if computed_crc != stored_crc {
            return Err(Error::load(format!(
                "CRC64 mismatch in {}: computed 0x{:016X}, stored 0x{:016X}",
                what, computed_crc, stored_crc
            )));
        }

        let domain = bytes[6];
        bytes.truncate(body_len);
        Ok((
            Self {
                what,
                body: bytes,
                pos: HEADER_LEN,
            },
            domain,
        ))
    }

    fn take(&mut self, n: usize) -> Result<&[u8]> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.body.len());
        match end {
            Some(end) => {
                let slice = &self.body[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(Error::load(format!(
                "{} ends early at byte {} (needed {} more)",
                self.what, self.pos, n
            ))),
        }
    }

    /// Reject counts that could not possibly fit in the remaining bytes
    /// before allocating for them
    pub fn ensure_items(&self, count: u64, item_bytes: usize) -> Result<usize> {
        let remaining = (self.body.len() - self.pos) as u64;
        match count.checked_mul(item_bytes as u64) {
            Some(total) if total <= remaining => Ok(count as usize),
            _ => Err(Error::load(format!(
                "{} declares {} items of {} bytes but only {} bytes remain",
                self.what, count, item_bytes, remaining
            ))),
        }
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    pub fn get_i64(&mut self) -> Result<i64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(i64::from_le_bytes(buf))
    }

    pub fn get_array32(&mut self) -> Result<[u8; 32]> {
        let mut buf = [0u8; 32];
        buf.copy_from_slice(self.take(32)?);
        Ok(buf)
    }

    pub fn get_weight<W: Weight>(&mut self) -> Result<W> {
        Ok(W::decode(self.take(W::BYTES)?))
    }

    pub fn get_u8_vec(&mut self, count: u64) -> Result<Vec<u8>> {
        let n = self.ensure_items(count, 1)?;
        Ok(self.take(n)?.to_vec())
    }

    pub fn get_u32_vec(&mut self, count: u64) -> Result<Vec<u32>> {
        let n = self.ensure_items(count, 4)?;
        (0..n).map(|_| self.get_u32()).collect()
    }

    pub fn get_u64_vec(&mut self, count: u64) -> Result<Vec<u64>> {
        let n = self.ensure_items(count, 8)?;
        (0..n).map(|_| self.get_u64()).collect()
    }

    pub fn get_weight_vec<W: Weight>(&mut self, count: u64) -> Result<Vec<W>> {
        let n = self.ensure_items(count, W::BYTES)?;
        (0..n).map(|_| self.get_weight()).collect()
    }

    /// Fail unless the whole body was consumed
    pub fn finish(self) -> Result<()> {
        if self.pos != self.body.len() {
            return Err(Error::load(format!(
                "{} has {} trailing bytes",
                self.what,
                self.body.len() - self.pos
            )));
        }
        Ok(())
    }
}

/// Check that a header's domain tag matches the weight type being decoded
pub fn expect_domain<W: Weight>(what: &str, tag: u8) -> Result<()> {
    match NumericDomain::from_tag(tag) {
        Some(domain) if domain == W::DOMAIN => Ok(()),
        Some(domain) => Err(Error::load(format!(
            "{} holds {} weights, expected {}",
            what,
            domain,
            W::DOMAIN
        ))),
        None => Err(Error::load(format!("{} has unknown domain tag {}", what, tag))),
    }
}

/// Read just the magic and domain tag of a file without verifying it
pub fn peek_header<P: AsRef<Path>>(path: P) -> Result<(u32, u16, u8)> {
    use std::io::Read;
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| Error::load_io(path, e))?;
    let mut header = [0u8; HEADER_LEN];
    file.read_exact(&mut header)
        .map_err(|e| Error::load_io(path, e))?;
    let magic = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let version = u16::from_le_bytes([header[4], header[5]]);
    Ok((magic, version, header[6]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MAGIC: u32 = 0x54455354; // "TEST"

    fn write_sample(path: &Path) {
        let mut w = ChecksumWriter::create(path).unwrap();
        w.header(MAGIC, 3, NumericDomain::Real.tag()).unwrap();
        w.put_u64(2).unwrap();
        w.put_weight_slice(&[1.5f64, 2.5]).unwrap();
        w.put_u32(7).unwrap();
        w.finish().unwrap();
    }

    #[test]
    fn test_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.bin");
        write_sample(&path);

        let (mut r, domain) = ChecksumReader::open(&path, "sample", MAGIC, 3).unwrap();
        expect_domain::<f64>("sample", domain).unwrap();
        let n = r.get_u64().unwrap();
        assert_eq!(r.get_weight_vec::<f64>(n).unwrap(), vec![1.5, 2.5]);
        assert_eq!(r.get_u32().unwrap(), 7);
        r.finish().unwrap();

        assert_eq!(peek_header(&path).unwrap(), (MAGIC, 3, 2));
    }

    #[test]
    fn test_rejects_wrong_version_and_magic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.bin");
        write_sample(&path);

        let err = ChecksumReader::open(&path, "sample", MAGIC, 4).err().unwrap();
        assert!(err.to_string().contains("version"));
        let err = ChecksumReader::open(&path, "sample", MAGIC + 1, 3).err().unwrap();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn test_rejects_corruption() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.bin");
        write_sample(&path);

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[12] ^= 0xFF;
        let err = ChecksumReader::from_bytes(bytes, "sample", MAGIC, 3).err().unwrap();
        assert!(matches!(err, Error::LoadError(_)));
        assert!(err.to_string().contains("CRC64"));
    }

    #[test]
    fn test_rejects_domain_mismatch() {
        assert!(expect_domain::<u32>("x", NumericDomain::Real.tag()).is_err());
        assert!(expect_domain::<u32>("x", 9).is_err());
        assert!(expect_domain::<u32>("x", NumericDomain::Integer.tag()).is_ok());
    }

    #[test]
    fn test_cursor_bounds() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.bin");
        write_sample(&path);

        let (mut r, _) = ChecksumReader::open(&path, "sample", MAGIC, 3).unwrap();
        assert!(r.get_u32_vec(1_000_000).is_err());
        let _ = r.get_u64().unwrap();
        let _ = r.get_weight_vec::<f64>(2).unwrap();
        let _ = r.get_u32().unwrap();
        assert!(r.get_u8().is_err());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.bin");
        write_sample(&path);
        let (r, _) = ChecksumReader::open(&path, "sample", MAGIC, 3).unwrap();
        assert!(r.finish().is_err());
    }
}
