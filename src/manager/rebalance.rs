//! Topology changes: join, failure and periodic resync
//!
//! Registry mutation and the WAL snapshot happen under the gate. The
//! `Sync` + `Replay` fan-out happens after the gate is released, so a later
//! rebalance may overlap an earlier broadcast; the last `Replay` a node
//! receives defines its state. Nodes that fail during a broadcast are
//! removed in a further round rather than by recursion.

use crate::common::{Command, Result};
use crate::manager::node_client::{NodeHandle, NodeId};
use crate::manager::registry::{Assignment, Liveness};
use crate::manager::Manager;
use futures_util::future::join_all;

/// Ranges to push plus the history each node rebuilds from
struct RebuildPlan {
    assignments: Vec<Assignment>,
    history: Vec<Command>,
}

impl Manager {
    /// Register a node, repartition, and rebuild every node
    pub async fn join_node(&self, handle: NodeHandle, liveness: Liveness) {
        let id = handle.id();
        let addr = handle.addr();

        let plan = {
            let _gate = self.gate.lock().await;
            let assignments = {
                let mut registry = self.registry.write().await;
                registry.insert(handle, liveness);
                registry.reassign()
            };
            tracing::info!(
                node_id = id,
                %addr,
                nodes = assignments.len(),
                "storage node joined"
            );
            self.plan(assignments).await
        };

        if let Some(plan) = plan {
            self.rebuild(plan).await;
        }
    }

    /// Remove a failed node and rebuild the survivors. A node that is
    /// already gone is ignored.
    pub async fn handle_node_failure(&self, id: NodeId) {
        self.fail_nodes(&[id]).await;
    }

    pub async fn fail_nodes(&self, ids: &[NodeId]) {
        if let Some(plan) = self.remove_nodes(ids).await {
            self.rebuild(plan).await;
        }
    }

    /// Push the full WAL to every node without touching ranges
    pub async fn resync(&self) {
        // history is read under the gate, after any in-flight rebalance plan
        let (nodes, history) = {
            let _gate = self.gate.lock().await;
            let nodes = self.assignments().await;
            if nodes.is_empty() {
                return;
            }
            match self.wal.snapshot().await {
                Ok(history) => (nodes, history),
                Err(e) => {
                    tracing::error!("resync skipped, WAL unreadable: {}", e);
                    return;
                }
            }
        };

        let entries = history.len();
        let sync = Command::Sync { commands: history };
        let outcomes = join_all(nodes.iter().map(|node| {
            let sync = sync.clone();
            async move { (node.id(), node.handle.request(sync).await) }
        }))
        .await;

        let failed = failed_ids(outcomes);
        self.metrics().resyncs_total.inc();
        tracing::debug!(nodes = nodes.len(), entries, failed = failed.len(), "resync round");

        if !failed.is_empty() {
            self.fail_nodes(&failed).await;
        }
    }

    async fn remove_nodes(&self, ids: &[NodeId]) -> Option<RebuildPlan> {
        let _gate = self.gate.lock().await;
        let assignments = {
            let mut registry = self.registry.write().await;
            let mut removed = 0;
            for &id in ids {
                if let Some(record) = registry.remove(id) {
                    record.liveness.mark_dead();
                    self.metrics().node_failures_total.inc();
                    tracing::warn!(node_id = id, addr = %record.addr(), "storage node removed");
                    removed += 1;
                }
            }
            if removed == 0 {
                return None;
            }
            registry.reassign()
        };
        tracing::info!(nodes = assignments.len(), "repartitioned after node loss");
        self.plan(assignments).await
    }

    /// Pair a fresh assignment with the WAL contents. Called under the gate.
    async fn plan(&self, assignments: Vec<Assignment>) -> Option<RebuildPlan> {
        match self.wal.snapshot().await {
            Ok(history) => Some(RebuildPlan {
                assignments,
                history,
            }),
            Err(e) => {
                tracing::error!("rebuild skipped, WAL unreadable: {}", e);
                None
            }
        }
    }

    async fn rebuild(&self, mut plan: RebuildPlan) {
        loop {
            let failed = self.broadcast_rebuild(&plan).await;
            self.metrics().rebalances_total.inc();
            if failed.is_empty() {
                return;
            }
            match self.remove_nodes(&failed).await {
                Some(next) => plan = next,
                None => return,
            }
        }
    }

    /// Send `Sync` then `Replay` to every planned node. Returns the nodes
    /// that could not be reached.
    async fn broadcast_rebuild(&self, plan: &RebuildPlan) -> Vec<NodeId> {
        let outcomes = join_all(plan.assignments.iter().map(|assignment| async move {
            let result = rebuild_node(assignment, &plan.history).await;
            (assignment.id(), result)
        }))
        .await;
        failed_ids(outcomes)
    }
}

async fn rebuild_node(assignment: &Assignment, history: &[Command]) -> Result<()> {
    let sync = assignment
        .handle
        .request(Command::Sync {
            commands: history.to_vec(),
        })
        .await?;
    let replay = assignment
        .handle
        .request(Command::Replay {
            range: assignment.range,
        })
        .await?;

    tracing::debug!(
        node_id = assignment.id(),
        range = %assignment.range,
        sync = %sync,
        replay = %replay,
        "node rebuilt"
    );
    Ok(())
}

fn failed_ids<T>(outcomes: Vec<(NodeId, Result<T>)>) -> Vec<NodeId> {
    outcomes
        .into_iter()
        .filter_map(|(id, result)| match result {
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(node_id = id, "storage not available: {}", e);
                Some(id)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{parse, partition, PartitionRange};
    use crate::manager::testing::{join_node, spawn_node, test_manager};
    use std::time::Duration;
    use tempfile::tempdir;

    async fn ask(node: &NodeHandle, line: &str) -> String {
        node.request(parse(line).unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn test_join_assigns_ranges_in_join_order() {
        let dir = tempdir().unwrap();
        let manager = test_manager(dir.path());

        let first = join_node(&manager, dir.path()).await;
        let assignments = manager.assignments().await;
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].range, PartitionRange::full());

        let second = join_node(&manager, dir.path()).await;
        let ranges = partition(2);
        let assignments: Vec<_> = manager
            .assignments()
            .await
            .iter()
            .map(|a| (a.id(), a.range))
            .collect();
        assert_eq!(
            assignments,
            vec![(first.id(), ranges[0]), (second.id(), ranges[1])]
        );
        assert_eq!(manager.metrics().rebalances_total.get(), 2);
    }

    #[tokio::test]
    async fn test_join_redistributes_data() {
        let dir = tempdir().unwrap();
        let manager = test_manager(dir.path());

        let first = join_node(&manager, dir.path()).await;
        assert_eq!(manager.handle_request("set a 1").await, "1");
        assert_eq!(manager.handle_request("set hello 2").await, "2");
        assert_eq!(ask(&first.handle, "keys").await, "a\nhello");

        let second = join_node(&manager, dir.path()).await;
        assert_eq!(ask(&first.handle, "keys").await, "a");
        assert_eq!(ask(&second.handle, "keys").await, "hello");
        assert_eq!(manager.handle_request("get a").await, "1");
        assert_eq!(manager.handle_request("get hello").await, "2");
    }

    #[tokio::test]
    async fn test_failure_rebuilds_survivors() {
        let dir = tempdir().unwrap();
        let manager = test_manager(dir.path());

        let first = join_node(&manager, dir.path()).await;
        let second = join_node(&manager, dir.path()).await;
        manager.handle_request("set a 1").await;
        manager.handle_request("set hello 2").await;

        second.kill();
        manager.handle_node_failure(second.id()).await;

        assert!(second.liveness.is_dead());
        let assignments = manager.assignments().await;
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].id(), first.id());
        assert_eq!(assignments[0].range, PartitionRange::full());
        assert_eq!(ask(&first.handle, "keys").await, "a\nhello");
        assert_eq!(manager.metrics().node_failures_total.get(), 1);
    }

    #[tokio::test]
    async fn test_repeated_failure_is_ignored() {
        let dir = tempdir().unwrap();
        let manager = test_manager(dir.path());

        let _first = join_node(&manager, dir.path()).await;
        let second = join_node(&manager, dir.path()).await;
        second.kill();

        manager.handle_node_failure(second.id()).await;
        let rebalances = manager.metrics().rebalances_total.get();
        manager.handle_node_failure(second.id()).await;

        assert_eq!(manager.metrics().rebalances_total.get(), rebalances);
        assert_eq!(manager.metrics().node_failures_total.get(), 1);
        assert_eq!(manager.node_count().await, 1);
    }

    #[tokio::test]
    async fn test_dead_node_found_during_join_broadcast() {
        let dir = tempdir().unwrap();
        let manager = test_manager(dir.path());

        let first = join_node(&manager, dir.path()).await;
        manager.handle_request("set a 1").await;
        first.kill();

        let second = join_node(&manager, dir.path()).await;

        let assignments = manager.assignments().await;
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].id(), second.id());
        assert_eq!(assignments[0].range, PartitionRange::full());
        assert!(first.liveness.is_dead());
        assert_eq!(ask(&second.handle, "get a").await, "1");
    }

    #[tokio::test]
    async fn test_all_nodes_lost() {
        let dir = tempdir().unwrap();
        let manager = test_manager(dir.path());

        let only = join_node(&manager, dir.path()).await;
        only.kill();
        manager.handle_node_failure(only.id()).await;

        assert_eq!(manager.node_count().await, 0);
        assert_eq!(manager.handle_request("get a").await, "No storages connected");
    }

    #[tokio::test]
    async fn test_resync_refreshes_replay_source() {
        let dir = tempdir().unwrap();
        let manager = test_manager(dir.path());

        let node = join_node(&manager, dir.path()).await;
        manager.handle_request("set a 1").await;

        // without a fresh Sync the replay source is still the empty join history
        manager.resync().await;
        node.handle
            .request(Command::Replay {
                range: PartitionRange::full(),
            })
            .await
            .unwrap();

        assert_eq!(ask(&node.handle, "get a").await, "1");
        assert_eq!(manager.metrics().resyncs_total.get(), 1);
    }

    #[tokio::test]
    async fn test_resync_reads_history_after_gate() {
        let dir = tempdir().unwrap();
        let manager = test_manager(dir.path());
        let node = join_node(&manager, dir.path()).await;

        let gate = manager.gate.lock().await;
        let resync = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.resync().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!resync.is_finished());

        // logged while the resync waits on the gate
        manager.wal().append(parse("set a 1").unwrap()).await.unwrap();
        drop(gate);
        resync.await.unwrap();

        node.handle
            .request(Command::Replay {
                range: PartitionRange::full(),
            })
            .await
            .unwrap();
        assert_eq!(ask(&node.handle, "get a").await, "1");
    }

    #[tokio::test]
    async fn test_resync_removes_dead_nodes() {
        let dir = tempdir().unwrap();
        let manager = test_manager(dir.path());

        let first = join_node(&manager, dir.path()).await;
        let second = join_node(&manager, dir.path()).await;
        first.kill();

        manager.resync().await;

        let assignments = manager.assignments().await;
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].id(), second.id());
    }

    #[tokio::test]
    async fn test_join_from_spawned_task() {
        let dir = tempdir().unwrap();
        let manager = test_manager(dir.path());

        let node = spawn_node(&manager, dir.path());
        let join = {
            let manager = manager.clone();
            let handle = node.handle.clone();
            let liveness = node.liveness.clone();
            tokio::spawn(async move { manager.join_node(handle, liveness).await })
        };
        join.await.unwrap();

        assert!(manager.registry.read().await.contains(node.id()));
    }
}
