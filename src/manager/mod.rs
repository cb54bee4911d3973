//! Manager implementation
//!
//! The manager owns the partitioning of the keyspace:
//! - Registry of storage nodes and their hash ranges
//! - Request routing (single owner, or broadcast for keyless commands)
//! - Write-ahead log of accepted commands and periodic resync
//! - Join/failure rebalancing via `Sync` + `Replay`
//! - Admin HTTP API

pub mod http;
pub mod node_client;
pub mod rebalance;
pub mod registry;
pub mod router;
pub mod server;
pub mod state;
pub mod wal;

#[cfg(test)]
pub(crate) mod testing;

pub use node_client::{NodeHandle, NodeId};
pub use registry::{Assignment, NodeRegistry};
pub use server::ManagerServer;
pub use state::Manager;
