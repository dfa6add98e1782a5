//! # ChunkCask
//!
//! An embedded, append-only key-value store with:
//! - 256 hash-routed buckets, each with its own chunk files
//! - Size-based chunk rotation
//! - CRC-32 checksummed records
//! - An in-memory index rebuilt by log replay on every open
//! - Torn-tail repair after a crash mid-append
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Engine (get/put/delete/list)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┼────────────────────┐
//!          │            │                    │
//!          ▼            ▼                    ▼
//!   ┌─────────────┐ ┌─────────────┐  ┌───────────────┐
//!   │   Router    │ │    Index    │  │ Chunk Manager │
//!   │ (256 bkts)  │ │  (RwLock)   │  │  (rotation)   │
//!   └─────────────┘ └──────▲──────┘  └───────┬───────┘
//!                          │                 │
//!                   ┌──────┴──────┐   ┌──────▼──────┐
//!                   │  Recovery   │◄──│ Record Codec│
//!                   │  (replay)   │   │   (CRC32)   │
//!                   └─────────────┘   └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod router;
pub mod chunk;
pub mod index;
pub mod recovery;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CaskError, Result};
pub use config::{Config, CorruptionPolicy};
pub use engine::Engine;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of ChunkCask
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
