//! Storage node process loop
//!
//! Dials the manager, then answers one framed command at a time until the
//! manager hangs up.

use crate::common::codec::{read_command, write_message};
use crate::common::{Error, Result, StorageConfig};
use crate::storage::node::StorageNode;
use crate::storage::replay_log::ReplayLog;
use tokio::io::BufReader;
use tokio::net::TcpStream;

pub struct StorageServer {
    config: StorageConfig,
}

impl StorageServer {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    pub async fn serve(self) -> Result<()> {
        tracing::info!("Starting storage node");
        tracing::info!("  Manager: {}", self.config.manager_addr);
        tracing::info!("  Data dir: {}", self.config.data_dir.display());

        tokio::fs::create_dir_all(&self.config.data_dir).await?;
        let replay_log = ReplayLog::in_dir(&self.config.data_dir);
        tracing::info!("  Replay file: {}", replay_log.path().display());

        let stream = TcpStream::connect(&self.config.manager_addr)
            .await
            .map_err(|e| {
                Error::ConnectionFailed(format!("{}: {}", self.config.manager_addr, e))
            })?;
        tracing::info!("✓ Connected to manager");

        let mut node = StorageNode::new(replay_log);
        let result = serve_connection(stream, &mut node).await;

        if let Err(e) = node.replay_log().discard().await {
            tracing::warn!("could not remove replay file: {}", e);
        }
        result
    }
}

/// Answer commands on an established manager connection until EOF
pub async fn serve_connection(stream: TcpStream, node: &mut StorageNode) -> Result<()> {
    let peer = stream.peer_addr().ok();
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    loop {
        let response = match read_command(&mut reader).await {
            Ok(Some(command)) => {
                let kind = command.kind();
                tracing::debug!(%kind, "command received");
                let response = node.execute(command).await;
                tracing::trace!(%kind, response = %response, "command executed");
                response
            }
            Ok(None) => {
                tracing::info!(?peer, "manager closed the connection");
                return Ok(());
            }
            Err(e @ (Error::UnknownCommandKind(_) | Error::Codec(_))) => {
                tracing::warn!(?peer, "rejected frame: {}", e);
                "Invalid command".to_string()
            }
            Err(e) => return Err(e),
        };

        write_message(&mut writer, &response).await?;
    }
}
