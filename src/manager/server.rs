//! Manager server
//!
//! Three listeners: clients (one text line per request), storage nodes
//! (framed commands pushed by the manager), and the admin HTTP API. Each
//! accepted connection runs in its own task.

use crate::common::{ManagerConfig, Result};
use crate::manager::http::{create_router, AdminState};
use crate::manager::node_client;
use crate::manager::registry::Liveness;
use crate::manager::wal::{self, run_resync, WalWriter};
use crate::manager::Manager;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;

pub struct ManagerServer {
    config: ManagerConfig,
    manager: Arc<Manager>,
    wal_writer: WalWriter,
    client_listener: TcpListener,
    storage_listener: TcpListener,
    admin_listener: TcpListener,
}

impl ManagerServer {
    /// Bind every listener. Nothing is served until [`run_until`].
    ///
    /// [`run_until`]: ManagerServer::run_until
    pub async fn bind(config: ManagerConfig) -> Result<Self> {
        let (wal, wal_writer) = wal::open(&config.wal_path, config.wal_queue_capacity);
        let manager = Arc::new(Manager::new(wal, config.node_timeout()));

        let client_listener = TcpListener::bind(config.client_addr).await?;
        let storage_listener = TcpListener::bind(config.storage_addr).await?;
        let admin_listener = TcpListener::bind(config.admin_addr).await?;

        Ok(Self {
            config,
            manager,
            wal_writer,
            client_listener,
            storage_listener,
            admin_listener,
        })
    }

    pub fn manager(&self) -> Arc<Manager> {
        self.manager.clone()
    }

    pub fn client_addr(&self) -> Result<SocketAddr> {
        Ok(self.client_listener.local_addr()?)
    }

    pub fn storage_addr(&self) -> Result<SocketAddr> {
        Ok(self.storage_listener.local_addr()?)
    }

    pub fn admin_addr(&self) -> Result<SocketAddr> {
        Ok(self.admin_listener.local_addr()?)
    }

    /// Serve until Ctrl-C
    pub async fn serve(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let ManagerServer {
            config,
            manager,
            wal_writer,
            client_listener,
            storage_listener,
            admin_listener,
        } = self;

        tracing::info!("Starting manager");
        tracing::info!("  Clients: {}", client_listener.local_addr()?);
        tracing::info!("  Storage nodes: {}", storage_listener.local_addr()?);
        tracing::info!("  Admin API: {}", admin_listener.local_addr()?);
        tracing::info!("  WAL: {}", config.wal_path.display());

        let mut background = JoinSet::new();
        background.spawn(async move {
            if let Err(e) = wal_writer.run().await {
                tracing::error!("WAL writer stopped: {}", e);
            }
        });
        if let Some((delay, period)) = config.resync_schedule() {
            tracing::info!("  Resync: every {:?} after {:?}", period, delay);
            background.spawn(run_resync(manager.clone(), delay, period));
        }
        let admin_router = create_router(AdminState {
            manager: manager.clone(),
        });
        background.spawn(async move {
            if let Err(e) = axum::serve(admin_listener, admin_router).await {
                tracing::error!("Admin server error: {}", e);
            }
        });

        tracing::info!("✓ Manager ready");

        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutting down manager");
                    break;
                }
                accepted = client_listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        tracing::debug!(%addr, "client connected");
                        connections.spawn(handle_client(manager.clone(), stream, addr));
                    }
                    Err(e) => tracing::warn!("client accept failed: {}", e),
                },
                accepted = storage_listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        connections.spawn(supervise_node(manager.clone(), stream, addr));
                    }
                    Err(e) => tracing::warn!("storage accept failed: {}", e),
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        connections.shutdown().await;
        background.shutdown().await;
        Ok(())
    }
}

/// Longest accepted client request line, newline excluded
pub const MAX_REQUEST_BYTES: usize = 100 * 1024;

const REQUEST_TOO_LONG: &str = "Error: request too long";

/// Answer client lines until the client disconnects. Every non-blank line
/// gets exactly one response; bytes that are not UTF-8 are decoded lossily.
async fn handle_client(manager: Arc<Manager>, stream: TcpStream, addr: SocketAddr) {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = (&mut reader)
            .take(MAX_REQUEST_BYTES as u64 + 1)
            .read_until(b'\n', &mut buf)
            .await;
        match read {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(%addr, "client read failed: {}", e);
                break;
            }
        }

        let mut response = if buf.ends_with(b"\n") || buf.len() <= MAX_REQUEST_BYTES {
            let line = String::from_utf8_lossy(&buf);
            if line.trim().is_empty() {
                continue;
            }
            manager.handle_request(line.trim_end_matches(['\r', '\n'])).await
        } else {
            tracing::debug!(%addr, "client request over {} bytes", MAX_REQUEST_BYTES);
            if let Err(e) = skip_line(&mut reader).await {
                tracing::debug!(%addr, "client read failed: {}", e);
                break;
            }
            REQUEST_TOO_LONG.to_string()
        };

        response.push('\n');
        if let Err(e) = writer.write_all(response.as_bytes()).await {
            tracing::debug!(%addr, "client write failed: {}", e);
            break;
        }
    }

    tracing::debug!(%addr, "client disconnected");
}

/// Discard input up to and including the next newline
async fn skip_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<()> {
    loop {
        let chunk = reader.fill_buf().await?;
        if chunk.is_empty() {
            return Ok(());
        }
        match chunk.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                reader.consume(pos + 1);
                return Ok(());
            }
            None => {
                let len = chunk.len();
                reader.consume(len);
            }
        }
    }
}

/// Own one storage connection: register it, serve it until it dies or is
/// removed, then make sure it is out of the registry.
async fn supervise_node(manager: Arc<Manager>, stream: TcpStream, addr: SocketAddr) {
    let id = manager.next_node_id();
    tracing::info!(node_id = id, %addr, "storage node connected");

    let (handle, connection) = node_client::connect(id, addr, stream, manager.node_timeout());
    let liveness = Liveness::new();

    let ((), outcome) = tokio::join!(
        manager.join_node(handle, liveness.clone()),
        connection.run(liveness.dead()),
    );

    match outcome {
        Ok(()) => tracing::info!(node_id = id, "storage node released"),
        Err(e) => tracing::warn!(node_id = id, "storage node lost: {}", e),
    }
    manager.handle_node_failure(id).await;
}
