//! Registry of connected storage nodes and their ranges
//!
//! Nodes are keyed by a monotonic join sequence number. Every reassignment
//! zips the ids in ascending order with a fresh partitioning, so the same
//! join order always produces the same assignment and the newest node
//! always receives the last range.

use crate::common::{partition, PartitionRange};
use crate::manager::node_client::{NodeHandle, NodeId};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

/// Single-fire death signal for one node
#[derive(Debug, Clone)]
pub struct Liveness {
    tx: Arc<watch::Sender<bool>>,
}

impl Liveness {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn mark_dead(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_dead(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`Liveness::mark_dead`] has been called
    pub async fn dead(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|dead| *dead).await;
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct NodeRecord {
    pub handle: NodeHandle,
    pub range: PartitionRange,
    pub liveness: Liveness,
    pub joined_at: DateTime<Utc>,
}

impl NodeRecord {
    pub fn id(&self) -> NodeId {
        self.handle.id()
    }

    pub fn addr(&self) -> SocketAddr {
        self.handle.addr()
    }
}

/// A node paired with the range it owns at snapshot time
#[derive(Debug, Clone)]
pub struct Assignment {
    pub handle: NodeHandle,
    pub range: PartitionRange,
}

impl Assignment {
    pub fn id(&self) -> NodeId {
        self.handle.id()
    }
}

#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: BTreeMap<NodeId, NodeRecord>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeRecord> {
        self.nodes.get(&id)
    }

    /// Add a node. Its range is provisional until the next [`reassign`].
    ///
    /// [`reassign`]: NodeRegistry::reassign
    pub fn insert(&mut self, handle: NodeHandle, liveness: Liveness) {
        let record = NodeRecord {
            handle,
            range: PartitionRange::full(),
            liveness,
            joined_at: Utc::now(),
        };
        self.nodes.insert(record.id(), record);
    }

    pub fn remove(&mut self, id: NodeId) -> Option<NodeRecord> {
        self.nodes.remove(&id)
    }

    /// Partition the keyspace across the current nodes in id order
    pub fn reassign(&mut self) -> Vec<Assignment> {
        let ranges = partition(self.nodes.len());
        for (record, range) in self.nodes.values_mut().zip(ranges) {
            record.range = range;
        }
        self.assignments()
    }

    /// Current assignment in id order
    pub fn assignments(&self) -> Vec<Assignment> {
        self.nodes
            .values()
            .map(|record| Assignment {
                handle: record.handle.clone(),
                range: record.range,
            })
            .collect()
    }

    /// First node whose range contains `hash`
    pub fn owner_of(&self, hash: i32) -> Option<&NodeRecord> {
        self.nodes.values().find(|record| record.range.contains(hash))
    }

    pub fn records(&self) -> impl Iterator<Item = &NodeRecord> {
        self.nodes.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::key_hash;

    fn handle(id: NodeId) -> NodeHandle {
        let addr: SocketAddr = format!("127.0.0.1:{}", 9000 + id).parse().unwrap();
        NodeHandle::channel(id, addr).0
    }

    fn registry_with(ids: &[NodeId]) -> NodeRegistry {
        let mut registry = NodeRegistry::new();
        for &id in ids {
            registry.insert(handle(id), Liveness::new());
            registry.reassign();
        }
        registry
    }

    fn ranges_by_id(registry: &NodeRegistry) -> Vec<(NodeId, PartitionRange)> {
        registry.records().map(|r| (r.id(), r.range)).collect()
    }

    #[test]
    fn test_single_node_owns_everything() {
        let registry = registry_with(&[1]);
        assert_eq!(ranges_by_id(&registry), vec![(1, PartitionRange::full())]);
    }

    #[test]
    fn test_new_node_gets_last_range() {
        let registry = registry_with(&[1, 2, 3]);
        let ranges = partition(3);
        assert_eq!(
            ranges_by_id(&registry),
            vec![(1, ranges[0]), (2, ranges[1]), (3, ranges[2])]
        );
    }

    #[test]
    fn test_assignment_reproducible() {
        let a = registry_with(&[4, 9, 11]);
        let b = registry_with(&[4, 9, 11]);
        assert_eq!(ranges_by_id(&a), ranges_by_id(&b));
    }

    #[test]
    fn test_assignment_ignores_insertion_order() {
        let mut registry = NodeRegistry::new();
        registry.insert(handle(5), Liveness::new());
        registry.insert(handle(2), Liveness::new());
        registry.reassign();

        let ranges = partition(2);
        assert_eq!(ranges_by_id(&registry), vec![(2, ranges[0]), (5, ranges[1])]);
    }

    #[test]
    fn test_remove_and_reassign() {
        let mut registry = registry_with(&[1, 2, 3]);
        assert!(registry.remove(2).is_some());
        assert!(registry.remove(2).is_none());
        registry.reassign();

        let ranges = partition(2);
        assert_eq!(ranges_by_id(&registry), vec![(1, ranges[0]), (3, ranges[1])]);
    }

    #[test]
    fn test_owner_lookup() {
        let registry = registry_with(&[1, 2]);
        assert_eq!(registry.owner_of(key_hash("a")).unwrap().id(), 1);
        assert_eq!(registry.owner_of(key_hash("hello")).unwrap().id(), 2);
        assert_eq!(registry.owner_of(i32::MIN).unwrap().id(), 1);
        assert_eq!(registry.owner_of(i32::MAX).unwrap().id(), 2);

        // same key, same topology, same owner
        for _ in 0..10 {
            assert_eq!(registry.owner_of(key_hash("user:42")).unwrap().id(), 2);
        }
    }

    #[test]
    fn test_empty_registry() {
        let mut registry = NodeRegistry::new();
        assert!(registry.reassign().is_empty());
        assert!(registry.owner_of(0).is_none());
    }

    #[tokio::test]
    async fn test_liveness_single_fire() {
        let liveness = Liveness::new();
        assert!(!liveness.is_dead());

        let waiter = {
            let liveness = liveness.clone();
            tokio::spawn(async move { liveness.dead().await })
        };
        liveness.mark_dead();
        liveness.mark_dead();
        waiter.await.unwrap();
        assert!(liveness.is_dead());

        // already dead resolves immediately
        liveness.dead().await;
    }
}
