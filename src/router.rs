//! Hash Router
//!
//! Maps every key to one of 256 fixed buckets.
//!
//! The bucket id is baked into the on-disk directory layout, so the hash
//! function must stay the same for the whole life of a store.

use xxhash_rust::xxh32::xxh32;

/// Number of buckets. Never resized.
pub const BUCKET_COUNT: usize = 256;

/// Identifier of one of the 256 buckets
pub type BucketId = u8;

/// Deterministic, non-cryptographic 32-bit hash over byte strings
pub trait KeyHasher: Send + Sync {
    fn hash32(&self, key: &[u8]) -> u32;
}

/// xxHash32 with a fixed seed (the default router hash)
#[derive(Debug, Clone, Copy, Default)]
pub struct Xxh32Hasher {
    seed: u32,
}

impl Xxh32Hasher {
    pub fn with_seed(seed: u32) -> Self {
        Self { seed }
    }
}

impl KeyHasher for Xxh32Hasher {
    fn hash32(&self, key: &[u8]) -> u32 {
        xxh32(key, self.seed)
    }
}

/// Routes keys to buckets
pub struct Router {
    hasher: Box<dyn KeyHasher>,
}

impl Router {
    pub fn new(hasher: Box<dyn KeyHasher>) -> Self {
        Self { hasher }
    }

    /// `hash(key) & 0xFF`
    pub fn bucket_of(&self, key: &[u8]) -> BucketId {
        (self.hasher.hash32(key) & 0xFF) as BucketId
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(Box::new(Xxh32Hasher::default()))
    }
}
