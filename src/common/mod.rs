//! Common types shared by the manager and the storage nodes

pub mod codec;
pub mod command;
pub mod command_log;
pub mod config;
pub mod error;
pub mod hash;
pub mod metrics;
pub mod parser;

pub use command::{can_replay, Command, CommandKind};
pub use config::{Config, ManagerConfig, StorageConfig};
pub use error::{Error, Result};
pub use hash::{key_hash, partition, PartitionRange};
pub use parser::{parse, ParseError};
