//! Storage node implementation
//!
//! A storage node keeps its share of the keyspace in memory:
//! - Typed values (strings, hashes, lists) in a local store
//! - A private replay file refreshed by the manager (`Sync`)
//! - Range-filtered rebuild of the store from that file (`Replay`)

pub mod node;
pub mod replay_log;
pub mod server;
pub mod store;

pub use node::StorageNode;
pub use server::StorageServer;
