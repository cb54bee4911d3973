//! Shared harness: a manager on ephemeral ports plus in-process storage nodes

#![allow(dead_code)]

use imdg::common::{ManagerConfig, StorageConfig};
use imdg::{Manager, ManagerServer, StorageServer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub struct Cluster {
    pub manager: Arc<Manager>,
    pub client_addr: SocketAddr,
    pub storage_addr: SocketAddr,
    pub admin_addr: SocketAddr,
    pub dir: TempDir,
    shutdown: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<imdg::Result<()>>>,
    spawned: usize,
}

impl Cluster {
    pub async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let any: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let config = ManagerConfig {
            client_addr: any,
            storage_addr: any,
            admin_addr: any,
            wal_path: dir.path().join("wal.jsonl"),
            resync_interval_secs: 0,
            node_timeout_ms: 5_000,
            ..ManagerConfig::default()
        };

        let server = ManagerServer::bind(config).await.unwrap();
        let manager = server.manager();
        let client_addr = server.client_addr().unwrap();
        let storage_addr = server.storage_addr().unwrap();
        let admin_addr = server.admin_addr().unwrap();

        let (tx, rx) = oneshot::channel::<()>();
        let server = tokio::spawn(server.run_until(async move {
            let _ = rx.await;
        }));

        Self {
            manager,
            client_addr,
            storage_addr,
            admin_addr,
            dir,
            shutdown: Some(tx),
            server: Some(server),
            spawned: 0,
        }
    }

    pub fn node_dir(&self, n: usize) -> PathBuf {
        self.dir.path().join(format!("node-{}", n))
    }

    /// Start a storage node that dials this manager
    pub fn spawn_storage(&mut self) -> JoinHandle<imdg::Result<()>> {
        self.spawned += 1;
        let config = StorageConfig {
            manager_addr: self.storage_addr.to_string(),
            data_dir: self.node_dir(self.spawned),
        };
        tokio::spawn(StorageServer::new(config).serve())
    }

    /// Start a node and wait until its join rebalance has completed
    pub async fn add_storage(&mut self) -> JoinHandle<imdg::Result<()>> {
        let expected = self.manager.metrics().rebalances_total.get() + 1;
        let node = self.spawn_storage();
        self.wait_for_rebalances(expected).await;
        node
    }

    /// Kill a node and wait until the survivors have been rebuilt
    pub async fn lose_storage(&self, node: JoinHandle<imdg::Result<()>>, remaining: usize) {
        let expected = self.manager.metrics().rebalances_total.get() + 1;
        node.abort();
        self.wait_for_nodes(remaining).await;
        self.wait_for_rebalances(expected).await;
    }

    pub async fn wait_for_rebalances(&self, count: u64) {
        let manager = self.manager.clone();
        tokio::time::timeout(Duration::from_secs(10), async move {
            while manager.metrics().rebalances_total.get() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("rebalance did not complete");
    }

    pub async fn wait_for_nodes(&self, count: usize) {
        let manager = self.manager.clone();
        tokio::time::timeout(Duration::from_secs(10), async move {
            while manager.node_count().await != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("node count not reached");
    }

    pub async fn client(&self) -> Client {
        Client::connect(self.client_addr).await
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(server) = self.server.take() {
            server.await.unwrap().unwrap();
        }
    }
}

pub struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Client {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, writer) = stream.into_split();
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    /// Send one request and read a single-line response
    pub async fn request(&mut self, line: &str) -> String {
        self.request_lines(line, 1).await.remove(0)
    }

    /// Send one request whose response spans `count` lines
    pub async fn request_lines(&mut self, line: &str, count: usize) -> Vec<String> {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();

        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            let next = tokio::time::timeout(Duration::from_secs(10), self.lines.next_line())
                .await
                .expect("response timed out")
                .unwrap()
                .expect("manager closed the connection");
            out.push(next);
        }
        out
    }
}
