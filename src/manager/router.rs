//! Client request routing
//!
//! Key-bearing commands go to the single node whose range holds the key's
//! hash. Commands without a key go to every node, and the replies are
//! joined one per line in node id order. Every request gets exactly one
//! response string, errors included.

use crate::common::{key_hash, parse, Command, Error, Result};
use crate::manager::node_client::NodeHandle;
use crate::manager::Manager;
use futures_util::future::join_all;

impl Manager {
    /// Route one raw client line and produce the text sent back
    pub async fn handle_request(&self, raw: &str) -> String {
        self.metrics().requests_total.inc();

        match self.route(raw).await {
            Ok(response) => response,
            Err(e) => {
                match &e {
                    Error::Parse(_) => self.metrics().parse_errors_total.inc(),
                    Error::NoStorageAvailable => self.metrics().no_storage_total.inc(),
                    _ => {}
                }
                tracing::debug!(request = raw, "request failed: {}", e);
                e.client_message()
            }
        }
    }

    async fn route(&self, raw: &str) -> Result<String> {
        self.barrier().await;

        let nodes = self.assignments().await;
        if nodes.is_empty() {
            return Err(Error::NoStorageAvailable);
        }

        let command = parse(raw)?;
        self.wal.append(command.clone()).await?;
        self.metrics().wal_appends_total.inc();

        match command.key().map(key_hash) {
            Some(hash) => {
                let owner = nodes
                    .iter()
                    .find(|node| node.range.contains(hash))
                    .ok_or(Error::NoStorageAvailable)?;
                tracing::trace!(node_id = owner.id(), hash, "routing to owner");
                self.forward(&owner.handle, command).await
            }
            None => {
                let responses = join_all(nodes.iter().map(|node| {
                    let command = command.clone();
                    async move {
                        match self.forward(&node.handle, command).await {
                            Ok(response) => response,
                            Err(e) => e.client_message(),
                        }
                    }
                }))
                .await;
                Ok(responses.join("\n"))
            }
        }
    }

    /// Send to one node. A failed send removes the node before returning.
    async fn forward(&self, node: &NodeHandle, command: Command) -> Result<String> {
        match node.request(command).await {
            Ok(response) => Ok(response),
            Err(e) => {
                tracing::warn!(node_id = node.id(), addr = %node.addr(), "storage not available: {}", e);
                self.handle_node_failure(node.id()).await;
                Err(Error::NodeUnavailable(node.id()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::common::{parse, Command};
    use crate::manager::testing::{join_node, test_manager};
    use std::time::Duration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_no_storage_available() {
        let dir = tempdir().unwrap();
        let manager = test_manager(dir.path());

        assert_eq!(manager.handle_request("set a 1").await, "No storages connected");
        assert_eq!(manager.metrics().no_storage_total.get(), 1);
        assert!(manager.wal().snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_parse_error_has_no_side_effects() {
        let dir = tempdir().unwrap();
        let manager = test_manager(dir.path());
        let node = join_node(&manager, dir.path()).await;

        assert_eq!(manager.handle_request("foo bar").await, "Invalid command");
        assert_eq!(manager.handle_request("get").await, "Invalid command");
        assert!(manager.wal().snapshot().await.unwrap().is_empty());
        assert_eq!(manager.metrics().parse_errors_total.get(), 2);

        // node store untouched
        assert_eq!(
            node.handle.request(Command::Keys).await.unwrap(),
            "The storage is empty"
        );
    }

    #[tokio::test]
    async fn test_request_waits_for_rebalance_gate() {
        let dir = tempdir().unwrap();
        let manager = test_manager(dir.path());
        let _node = join_node(&manager, dir.path()).await;
        manager.handle_request("set a 1").await;

        let gate = manager.gate.lock().await;
        let mut request = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.handle_request("get a").await })
        };
        assert!(
            tokio::time::timeout(Duration::from_millis(50), &mut request)
                .await
                .is_err()
        );

        drop(gate);
        let response = tokio::time::timeout(Duration::from_secs(5), request)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response, "1");

        // the gate is free again once routing is past the barrier
        assert!(manager.gate.try_lock().is_ok());
    }

    #[tokio::test]
    async fn test_single_node_roundtrip() {
        let dir = tempdir().unwrap();
        let manager = test_manager(dir.path());
        let _node = join_node(&manager, dir.path()).await;

        assert_eq!(manager.handle_request("set a 1").await, "1");
        assert_eq!(manager.handle_request("get a").await, "1");
        assert_eq!(manager.handle_request("SET a 2").await, "Key already exists");
        assert_eq!(manager.handle_request("update a 2").await, "Updated");
        assert_eq!(manager.handle_request("get missing").await, "Key does not exist");
    }

    #[tokio::test]
    async fn test_every_command_is_logged() {
        let dir = tempdir().unwrap();
        let manager = test_manager(dir.path());
        let _node = join_node(&manager, dir.path()).await;

        for line in ["set a 1", "get a", "keys", "getall"] {
            manager.handle_request(line).await;
        }

        let expected: Vec<Command> = ["set a 1", "get a", "keys", "getall"]
            .iter()
            .map(|l| parse(l).unwrap())
            .collect();
        assert_eq!(manager.wal().snapshot().await.unwrap(), expected);
        assert_eq!(manager.metrics().wal_appends_total.get(), 4);
    }

    #[tokio::test]
    async fn test_key_routes_to_owner_only() {
        let dir = tempdir().unwrap();
        let manager = test_manager(dir.path());
        let first = join_node(&manager, dir.path()).await;
        let second = join_node(&manager, dir.path()).await;

        manager.handle_request("set a 1").await;
        manager.handle_request("set hello 2").await;

        assert_eq!(first.handle.request(Command::Keys).await.unwrap(), "a");
        assert_eq!(second.handle.request(Command::Keys).await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_broadcast_joins_responses_in_node_order() {
        let dir = tempdir().unwrap();
        let manager = test_manager(dir.path());
        let _first = join_node(&manager, dir.path()).await;
        let _second = join_node(&manager, dir.path()).await;

        manager.handle_request("set a 1").await;
        manager.handle_request("set hello 2").await;

        assert_eq!(manager.handle_request("keys").await, "a\nhello");
        assert_eq!(
            manager.handle_request("clear").await,
            "Database has been cleared\nDatabase has been cleared"
        );
        assert_eq!(manager.handle_request("get a").await, "Key does not exist");
    }

    #[tokio::test]
    async fn test_failed_send_removes_node() {
        let dir = tempdir().unwrap();
        let manager = test_manager(dir.path());
        let first = join_node(&manager, dir.path()).await;
        let second = join_node(&manager, dir.path()).await;

        manager.handle_request("set a 1").await;
        manager.handle_request("set hello 2").await;

        second.kill();
        assert_eq!(manager.handle_request("get hello").await, "Error: node unavailable");
        assert!(second.liveness.is_dead());
        assert_eq!(manager.node_count().await, 1);

        // no retry for the triggering request, but the next one succeeds
        assert_eq!(manager.handle_request("get hello").await, "2");
        assert_eq!(manager.handle_request("get a").await, "1");
        assert_eq!(first.handle.request(Command::Keys).await.unwrap(), "a\nhello");
    }

    #[tokio::test]
    async fn test_failed_node_in_broadcast() {
        let dir = tempdir().unwrap();
        let manager = test_manager(dir.path());
        let _first = join_node(&manager, dir.path()).await;
        let second = join_node(&manager, dir.path()).await;

        manager.handle_request("set a 1").await;
        second.kill();

        assert_eq!(
            manager.handle_request("keys").await,
            "a\nError: node unavailable"
        );
        assert_eq!(manager.node_count().await, 1);
    }
}
