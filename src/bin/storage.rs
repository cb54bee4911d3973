use anyhow::Result;
use clap::Parser;
use imdg::{common::Config, StorageServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "imdg-storage")]
#[command(about = "imdg storage node: holds one key range in memory")]
#[command(version)]
struct Args {
    /// Config file (defaults to ./imdg.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Manager address for storage nodes
    #[arg(short, long)]
    manager: Option<String>,

    /// Directory for the replay file
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    // Initialize tracing
    let log_level = args.log_level.unwrap_or(config.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut storage_config = config.storage;
    if let Some(addr) = args.manager {
        storage_config.manager_addr = addr;
    }
    if let Some(dir) = args.data_dir {
        storage_config.data_dir = dir;
    }

    // Run until the manager hangs up
    StorageServer::new(storage_config).serve().await?;

    Ok(())
}
