//! Storage node command execution
//!
//! Data commands go straight to the [`Store`]. The two control commands
//! implement the rebuild protocol driven by the manager:
//!
//! - `Sync(commands)` replaces the private replay source with `commands`
//! - `Replay(range)` clears the store and re-executes, in order, every
//!   replayable key-bearing command of the replay source whose key hashes
//!   into `range`

use crate::common::{Command, PartitionRange, Result};
use crate::storage::replay_log::ReplayLog;
use crate::storage::store::Store;

pub struct StorageNode {
    store: Store,
    replay_log: ReplayLog,
    range: Option<PartitionRange>,
}

impl StorageNode {
    pub fn new(replay_log: ReplayLog) -> Self {
        Self {
            store: Store::new(),
            replay_log,
            range: None,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Range assigned by the last replay, if any
    pub fn range(&self) -> Option<PartitionRange> {
        self.range
    }

    pub fn replay_log(&self) -> &ReplayLog {
        &self.replay_log
    }

    /// Execute one command and return the reply sent back to the manager
    pub async fn execute(&mut self, command: Command) -> String {
        match command {
            Command::Sync { commands } => match self.sync(&commands).await {
                Ok(()) => "Sync ok".to_string(),
                Err(e) => {
                    tracing::error!("sync failed: {}", e);
                    format!("Error: {}", e)
                }
            },
            Command::Replay { range } => match self.replay(range).await {
                Ok(applied) => {
                    tracing::info!(%range, applied, keys = self.store.len(), "replay complete");
                    "Replay ok".to_string()
                }
                Err(e) => {
                    tracing::error!(%range, "replay failed: {}", e);
                    format!("Error: {}", e)
                }
            },
            command => self.store.execute(&command),
        }
    }

    async fn sync(&mut self, commands: &[Command]) -> Result<()> {
        self.replay_log.replace(commands).await?;
        tracing::debug!(entries = commands.len(), "replay source replaced");
        Ok(())
    }

    /// Rebuild the store from the replay source. Returns the number of
    /// commands re-executed.
    async fn replay(&mut self, range: PartitionRange) -> Result<usize> {
        let history = self.replay_log.read().await?;
        let owned: Vec<Command> = history
            .into_iter()
            .filter(|command| command.can_replay())
            .filter(|command| command.key().is_some_and(|key| range.owns(key)))
            .collect();

        self.store.clear();
        for command in &owned {
            self.store.execute(command);
        }
        self.range = Some(range);

        Ok(owned.len())
    }
}
