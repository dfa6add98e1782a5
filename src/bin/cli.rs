//! ChunkCask CLI
//!
//! Opens a store directory, runs one command and exits.

use std::process::ExitCode;

use chunkcask::config::DEFAULT_ROTATION_THRESHOLD;
use chunkcask::{CaskError, Config, CorruptionPolicy, Engine};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// ChunkCask CLI
#[derive(Parser, Debug)]
#[command(name = "chunkcask-cli")]
#[command(about = "CLI for the ChunkCask embedded key-value store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./chunkcask_data")]
    data_dir: String,

    /// Chunk rotation threshold in bytes
    #[arg(short, long, default_value_t = DEFAULT_ROTATION_THRESHOLD)]
    rotation_threshold: u64,

    /// Skip the rest of a corrupt chunk instead of refusing to open
    #[arg(long)]
    lenient: bool,

    /// Do not verify record checksums during recovery
    #[arg(long)]
    no_verify: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Put {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// List bucket ids present in the store
    Buckets,

    /// List live keys of a bucket (decimal or 0x-prefixed hex)
    Keys {
        /// Bucket id
        bucket: String,
    },

    /// Print recovery statistics
    Stats,
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,chunkcask=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .rotation_threshold_bytes(args.rotation_threshold)
        .verify_checksums(!args.no_verify)
        .corruption_policy(if args.lenient {
            CorruptionPolicy::SkipChunkRemainder
        } else {
            CorruptionPolicy::Abort
        })
        .build();

    let engine = match Engine::open(config) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to open store: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(&engine, args.command) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(engine: &Engine, command: Commands) -> Result<ExitCode, CaskError> {
    match command {
        Commands::Get { key } => match engine.get(key.as_bytes())? {
            Some(value) => println!("{}", String::from_utf8_lossy(&value)),
            None => {
                println!("(nil)");
                return Ok(ExitCode::from(1));
            }
        },
        Commands::Put { key, value } => {
            engine.put(key.as_bytes(), value.as_bytes())?;
            println!("OK");
        }
        Commands::Del { key } => {
            engine.delete(key.as_bytes())?;
            println!("OK");
        }
        Commands::Buckets => {
            for bucket in engine.list_bucket_ids() {
                println!("{:#04x}", bucket);
            }
        }
        Commands::Keys { bucket } => {
            let bucket = parse_bucket(&bucket)?;
            for key in engine.list_keys(bucket) {
                println!("{}", String::from_utf8_lossy(&key));
            }
        }
        Commands::Stats => {
            let stats = engine.recovery_result();
            println!("buckets:    {}", stats.buckets_recovered);
            println!("chunks:     {}", stats.chunks_replayed);
            println!("records:    {}", stats.records_applied);
            println!("tombstones: {}", stats.tombstones_applied);
            println!("truncated:  {}", stats.truncated_chunks);
            println!("corrupted:  {}", stats.corrupted_chunks);
            println!("ignored:    {}", stats.ignored_files);
            println!("live keys:  {}", engine.len());
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// "47" or "0x2f"
fn parse_bucket(s: &str) -> Result<u8, CaskError> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };
    parsed.map_err(|_| CaskError::Config(format!("invalid bucket id: {}", s)))
}
