//! # imdg
//!
//! An in-memory distributed key/value grid:
//! - A single manager partitions the 32-bit key-hash space into ranges
//! - Storage nodes each hold the keys of one range in memory
//! - Every accepted command is appended to the manager's WAL
//! - Joins and failures trigger a rebalance: each node receives the full
//!   WAL (`Sync`) and rebuilds its range from it (`Replay`)
//!
//! ## Architecture

#![allow(clippy::result_large_err)]
//!
//! ```text
//!   clients (text lines, :7000)
//!             │
//! ┌───────────▼─────────────────────────────┐
//! │              Manager                    │
//! │  router ─ registry ─ rebalance ─ WAL    │
//! │  admin HTTP (:7080)                     │
//! └───────────┬─────────────────────────────┘
//!             │ framed commands (:7001, nodes dial in)
//!   ┌─────────┴──────────┬──────────────┐
//!   │                    │              │
//! ┌─▼──────────┐   ┌─────▼──────┐   ┌───▼────────┐
//! │ Storage 1  │   │ Storage 2  │   │ Storage 3  │
//! │ [MIN, a]   │   │ [a+1, b]   │   │ [b+1, MAX] │
//! │ + replay   │   │ + replay   │   │ + replay   │
//! └────────────┘   └────────────┘   └────────────┘
//! ```
//!
//! ## Usage
//!
//! ### Start the manager
//! ```bash
//! imdg-manager serve --client 0.0.0.0:7000 --storage 0.0.0.0:7001 --wal ./file.json
//! ```
//!
//! ### Start storage nodes
//! ```bash
//! imdg-storage --manager 127.0.0.1:7001 --data-dir ./node-1
//! imdg-storage --manager 127.0.0.1:7001 --data-dir ./node-2
//! ```
//!
//! ### Use the CLI
//! ```bash
//! imdg --addr 127.0.0.1:7000 set a 1
//! imdg --addr 127.0.0.1:7000        # interactive
//! ```

pub mod common;
pub mod manager;
pub mod storage;

// Re-export commonly used types
pub use common::{Command, Config, Error, Result};
pub use manager::{Manager, ManagerServer};
pub use storage::{StorageNode, StorageServer};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build info
pub const BUILD_INFO: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CARGO_PKG_NAME"), ")");
