//! In-process fixtures for manager tests

use crate::manager::node_client::{NodeHandle, NodeId};
use crate::manager::registry::Liveness;
use crate::manager::{wal, Manager};
use crate::storage::replay_log::ReplayLog;
use crate::storage::StorageNode;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Manager with a running WAL writer under `dir`
pub(crate) fn test_manager(dir: &Path) -> Arc<Manager> {
    let (wal, writer) = wal::open(dir.join("wal.jsonl"), 64);
    tokio::spawn(writer.run());
    Arc::new(Manager::new(wal, Duration::from_secs(5)))
}

/// A storage node answering requests over its handle's channel
pub(crate) struct FakeNode {
    pub handle: NodeHandle,
    pub liveness: Liveness,
    pub task: JoinHandle<StorageNode>,
}

impl FakeNode {
    pub fn id(&self) -> NodeId {
        self.handle.id()
    }

    /// Drop the node's end of the channel, as if the process died
    pub fn kill(&self) {
        self.task.abort();
    }
}

pub(crate) fn spawn_node(manager: &Manager, dir: &Path) -> FakeNode {
    let id = manager.next_node_id();
    let addr: SocketAddr = ([127, 0, 0, 1], 20000 + id as u16).into();
    let (handle, mut requests) = NodeHandle::channel(id, addr);
    let replay_log = ReplayLog::in_dir(dir);

    let task = tokio::spawn(async move {
        let mut node = StorageNode::new(replay_log);
        while let Some(request) = requests.recv().await {
            let response = node.execute(request.command).await;
            let _ = request.respond_to.send(Ok(response));
        }
        node
    });

    FakeNode {
        handle,
        liveness: Liveness::new(),
        task,
    }
}

/// Spawn a node and run the join path for it
pub(crate) async fn join_node(manager: &Manager, dir: &Path) -> FakeNode {
    let node = spawn_node(manager, dir);
    manager
        .join_node(node.handle.clone(), node.liveness.clone())
        .await;
    node
}
