//! Configuration for ChunkCask
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{CaskError, Result};

/// Default size at which a bucket's active chunk file is rotated (64 MiB)
pub const DEFAULT_ROTATION_THRESHOLD: u64 = 64 * 1024 * 1024;

/// Main configuration for a ChunkCask store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all chunk files
    /// Internal structure:
    ///   {data_dir}/
    ///     └── {hex-hi}/{hex-lo}/{chunk-id:010}.dat
    pub data_dir: PathBuf,

    /// Size in bytes at or above which a chunk file stops taking appends
    pub rotation_threshold_bytes: u64,

    // -------------------------------------------------------------------------
    // Recovery Configuration
    // -------------------------------------------------------------------------
    /// Recompute and compare record checksums while replaying chunk files
    pub verify_checksums: bool,

    /// What recovery does when it meets a corrupt record
    pub corruption_policy: CorruptionPolicy,
}

/// Recovery behaviour on a corrupt (non-tail) record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorruptionPolicy {
    /// Fail `Engine::open` with `CaskError::Corruption` (default)
    Abort,

    /// Log a warning, ignore the rest of that chunk file and continue.
    /// The bucket's next write goes to a fresh chunk.
    SkipChunkRemainder,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./chunkcask_data"),
            rotation_threshold_bytes: DEFAULT_ROTATION_THRESHOLD,
            verify_checksums: true,
            corruption_policy: CorruptionPolicy::Abort,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.rotation_threshold_bytes == 0 {
            return Err(CaskError::Config(
                "rotation_threshold_bytes must be greater than zero".to_string(),
            ));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(CaskError::Config("data_dir must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all chunk files)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the chunk rotation threshold (in bytes)
    pub fn rotation_threshold_bytes(mut self, bytes: u64) -> Self {
        self.config.rotation_threshold_bytes = bytes;
        self
    }

    /// Enable or disable checksum verification during recovery
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.config.verify_checksums = verify;
        self
    }

    /// Set the recovery corruption policy
    pub fn corruption_policy(mut self, policy: CorruptionPolicy) -> Self {
        self.config.corruption_policy = policy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
