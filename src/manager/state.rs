//! Shared manager state
//!
//! One [`Manager`] is shared by every connection task. The registry is
//! read-mostly; all topology mutations go through the rebalance gate, which
//! is never held across node I/O.

use crate::common::metrics::ManagerMetrics;
use crate::manager::node_client::NodeId;
use crate::manager::registry::{Assignment, NodeRegistry};
use crate::manager::wal::WalHandle;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

pub struct Manager {
    pub(crate) registry: RwLock<NodeRegistry>,
    pub(crate) gate: Mutex<()>,
    pub(crate) wal: WalHandle,
    metrics: ManagerMetrics,
    next_id: AtomicU64,
    node_timeout: Duration,
    started_at: DateTime<Utc>,
}

impl Manager {
    pub fn new(wal: WalHandle, node_timeout: Duration) -> Self {
        Self {
            registry: RwLock::new(NodeRegistry::new()),
            gate: Mutex::new(()),
            wal,
            metrics: ManagerMetrics::new(),
            next_id: AtomicU64::new(1),
            node_timeout,
            started_at: Utc::now(),
        }
    }

    /// Ids follow join order and are never reused
    pub fn next_node_id(&self) -> NodeId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn node_timeout(&self) -> Duration {
        self.node_timeout
    }

    pub fn metrics(&self) -> &ManagerMetrics {
        &self.metrics
    }

    pub fn wal(&self) -> &WalHandle {
        &self.wal
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub async fn node_count(&self) -> usize {
        self.registry.read().await.len()
    }

    /// Snapshot of the current node/range assignment in id order
    pub async fn assignments(&self) -> Vec<Assignment> {
        self.registry.read().await.assignments()
    }

    /// Wait for any in-flight topology mutation to finish
    pub(crate) async fn barrier(&self) {
        drop(self.gate.lock().await);
    }
}
