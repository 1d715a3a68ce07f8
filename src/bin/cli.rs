//! lsmkv CLI
//!
//! Command-line interface for a local lsmkv data directory.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use lsmkv::command::Command;
use lsmkv::{Config, Engine, SyncStrategy};
use tracing_subscriber::{fmt, EnvFilter};

/// lsmkv CLI
#[derive(Parser, Debug)]
#[command(name = "lsmkv-cli")]
#[command(about = "CLI for the lsmkv embedded key-value store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./lsmkv_data")]
    data_dir: String,

    /// Merge the log before exiting
    #[arg(long)]
    merge_on_exit: bool,

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

        /// Value recorded in the tombstone
        #[arg(default_value = "")]
        value: String,
    },

    /// Compact the data log
    Merge,

    /// Print what the open-time scan found
    Stats,
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,lsmkv=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .sync_strategy(SyncStrategy::EveryWrite)
        .build();

    let engine = match Engine::open(config) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let code = match run(&engine, args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    };

    let shutdown = if args.merge_on_exit {
        engine.close()
    } else {
        engine.sync()
    };
    if let Err(e) = shutdown {
        tracing::error!("Failed to shut down cleanly: {}", e);
        return ExitCode::FAILURE;
    }

    code
}

fn run(engine: &Engine, command: Commands) -> lsmkv::Result<()> {
    match command {
        Commands::Get { key } => {
            match engine.execute(Command::Get {
                key: key.into_bytes(),
            })? {
                Some(value) => println!("{}", String::from_utf8_lossy(&value)),
                None => println!("(nil)"),
            }
        }
        Commands::Put { key, value } => {
            engine.execute(Command::Put {
                key: key.into_bytes(),
                value: value.into_bytes(),
            })?;
            println!("OK");
        }
        Commands::Del { key, value } => {
            engine.execute(Command::Delete {
                key: key.into_bytes(),
                value: value.into_bytes(),
            })?;
            println!("OK");
        }
        Commands::Merge => {
            let stats = engine.merge()?;
            println!(
                "live_keys={} bytes_before={} bytes_after={}",
                stats.live_keys, stats.bytes_before, stats.bytes_after
            );
        }
        Commands::Stats => {
            let stats = engine.recovery_stats();
            println!(
                "records={} tombstones={} live_keys={} log_bytes={}",
                stats.records_scanned,
                stats.tombstones,
                stats.live_keys,
                engine.log_size()
            );
        }
    }
    Ok(())
}
