//! CRC-64-ISO checksum utilities

use crc::{Crc, CRC_64_GO_ISO};

/// CRC-64-ISO algorithm
pub const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_GO_ISO);

/// Compute CRC-64 checksum for a byte slice
pub fn checksum(data: &[u8]) -> u64 {
    CRC64.checksum(data)
}

/// Incremental CRC-64 digest, fed chunk by chunk while a file is written
pub struct Digest {
    digest: crc::Digest<'static, u64>,
}

impl Digest {
    pub fn new() -> Self {
        Self {
            digest: CRC64.digest(),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.digest.update(data);
    }

    pub fn finalize(self) -> u64 {
        self.digest.finalize()
    }
}

impl Default for Digest {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc64_detects_single_bit_flip() {
        let data = b"butterfly distance structure";
        let mut flipped = data.to_vec();
        flipped[3] ^= 0x01;
        assert_ne!(checksum(data), checksum(&flipped));
    }

    #[test]
    fn test_crc64_incremental() {
        let data = b"header|body|more body";
        let mut digest = Digest::new();
        for chunk in data.chunks(5) {
            digest.update(chunk);
        }
        assert_eq!(digest.finalize(), checksum(data));
    }
}
