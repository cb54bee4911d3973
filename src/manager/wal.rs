//! Manager write-ahead log
//!
//! A single writer task owns the log file and consumes a bounded queue.
//! Appends land in arrival order; when the queue is full, producers wait.
//! Snapshots travel through the same queue, so a snapshot always reflects
//! every append accepted before it.
//!
//! The log is never compacted. It holds every accepted client command,
//! reads included; consumers filter with `can_replay` when they replay it.

use crate::common::command_log::{append_command, read_commands, truncate_torn_tail};
use crate::common::{Command, Error, Result};
use crate::manager::Manager;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};

enum WalMessage {
    Append(Command),
    Snapshot(oneshot::Sender<Result<Vec<Command>>>),
}

/// Producer side of the log
#[derive(Clone)]
pub struct WalHandle {
    tx: mpsc::Sender<WalMessage>,
    path: PathBuf,
}

impl WalHandle {
    /// Queue a command for appending
    pub async fn append(&self, command: Command) -> Result<()> {
        self.tx
            .send(WalMessage::Append(command))
            .await
            .map_err(|_| Error::Wal("writer stopped".into()))
    }

    /// Full log contents, including every append queued before this call
    pub async fn snapshot(&self) -> Result<Vec<Command>> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(WalMessage::Snapshot(reply))
            .await
            .map_err(|_| Error::Wal("writer stopped".into()))?;
        response
            .await
            .map_err(|_| Error::Wal("writer dropped snapshot".into()))?
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub struct WalWriter {
    path: PathBuf,
    rx: mpsc::Receiver<WalMessage>,
}

/// Create the queue for a log at `path`. Nothing touches the file until
/// the writer runs.
pub fn open(path: impl Into<PathBuf>, capacity: usize) -> (WalHandle, WalWriter) {
    let path = path.into();
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let handle = WalHandle {
        tx,
        path: path.clone(),
    };
    (handle, WalWriter { path, rx })
}

impl WalWriter {
    /// Drain the queue until every handle is dropped
    pub async fn run(mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut len = truncate_torn_tail(&self.path).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        tracing::info!(bytes = len, "WAL opened at {}", self.path.display());

        while let Some(message) = self.rx.recv().await {
            match message {
                WalMessage::Append(command) => match append_command(&mut file, &command).await {
                    Ok(written) => len += written,
                    Err(e) => {
                        tracing::error!(kind = %command.kind(), "WAL append failed: {}", e);
                        // no partial line may precede the next append
                        if let Err(e) = file.set_len(len).await {
                            tracing::error!("WAL rollback to {} bytes failed: {}", len, e);
                        }
                    }
                },
                WalMessage::Snapshot(reply) => {
                    let _ = reply.send(read_commands(&self.path).await);
                }
            }
        }

        tracing::debug!("WAL writer stopped");
        Ok(())
    }
}

/// Push the full log to every node on a fixed schedule
pub async fn run_resync(manager: Arc<Manager>, initial_delay: Duration, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + initial_delay, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        manager.resync().await;
    }
}
