//! Manager binary

use clap::{Parser, Subcommand};
use imdg::{common::Config, ManagerServer};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "imdg-manager")]
#[command(about = "imdg manager: partitions keys across storage nodes")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./imdg.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the manager
    Serve {
        /// Listen address for clients
        #[arg(long)]
        client: Option<SocketAddr>,

        /// Listen address for storage nodes
        #[arg(long)]
        storage: Option<SocketAddr>,

        /// Listen address for the admin HTTP API
        #[arg(long)]
        admin: Option<SocketAddr>,

        /// WAL file
        #[arg(long)]
        wal: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    // Load config from file and environment, CLI flags have priority
    let config = Config::load(cli.config.as_deref())?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Commands::Serve {
            client,
            storage,
            admin,
            wal,
        } => {
            let mut manager_config = config.manager;
            if let Some(addr) = client {
                manager_config.client_addr = addr;
            }
            if let Some(addr) = storage {
                manager_config.storage_addr = addr;
            }
            if let Some(addr) = admin {
                manager_config.admin_addr = addr;
            }
            if let Some(path) = wal {
                manager_config.wal_path = path;
            }

            let server = ManagerServer::bind(manager_config).await?;
            server.serve().await?;
        }
    }

    Ok(())
}
