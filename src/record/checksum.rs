//! Record checksums

/// 32-bit checksum over a record image supplied as consecutive parts
pub trait Checksummer: Send + Sync {
    fn checksum(&self, parts: &[&[u8]]) -> u32;
}

/// CRC-32 (IEEE) via crc32fast
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc32Checksum;

impl Checksummer for Crc32Checksum {
    fn checksum(&self, parts: &[&[u8]]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        for part in parts {
            hasher.update(part);
        }
        hasher.finalize()
    }
}
