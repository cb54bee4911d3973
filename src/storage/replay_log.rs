//! Private replay source of a storage node
//!
//! Holds the last command history pushed by the manager. Every `Sync`
//! replaces the whole file; every `Replay` reads it back.

use crate::common::command_log::{read_commands, replace_commands};
use crate::common::{Command, Result};
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub struct ReplayLog {
    path: PathBuf,
}

impl ReplayLog {
    /// Replay file at an explicit path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Fresh file named after a new instance id, so several nodes can share
    /// one data directory
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let name = format!("replay-{}.jsonl", Uuid::new_v4().simple());
        Self::new(dir.as_ref().join(name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn replace(&self, commands: &[Command]) -> Result<()> {
        replace_commands(&self.path, commands).await
    }

    pub async fn read(&self) -> Result<Vec<Command>> {
        read_commands(&self.path).await
    }

    /// Remove the file, ignoring a file that was never written
    pub async fn discard(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
