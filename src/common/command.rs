//! Command model shared by the manager, the storage nodes and the logs
//!
//! A `Command` is immutable once built. Its JSON form is internally tagged by
//! `kind`, so a WAL line or a wire frame is self-describing:
//!
//! ```text
//! {"kind":"HSet","key":"user","field":"name","value":"ada"}
//! {"kind":"Replay","range":{"start":-2147483648,"end":-2}}
//! ```

use crate::common::hash::PartitionRange;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Command {
    Get { key: String },
    Set { key: String, value: String },
    GetAll,
    Keys,
    Update { key: String, value: String },
    Remove { key: String },
    Find { key: String },
    Clear,
    HSet { key: String, field: String, value: String },
    HGetAll { key: String },
    HGet { key: String, field: String },
    HVal { key: String },
    HRemove { key: String, field: String },
    HKeys { key: String },
    LAdd { key: String, value: String },
    LGetAll { key: String },
    LRemove { key: String, value: String },
    LCount { key: String },
    /// Rebuild local state from the replay source, keeping only `range`
    Replay { range: PartitionRange },
    /// Replace the node's replay source with `commands`
    Sync { commands: Vec<Command> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    Get,
    Set,
    GetAll,
    Keys,
    Update,
    Remove,
    Find,
    Clear,
    HSet,
    HGetAll,
    HGet,
    HVal,
    HRemove,
    HKeys,
    LAdd,
    LGetAll,
    LRemove,
    LCount,
    Replay,
    Sync,
}

impl CommandKind {
    pub const ALL: [CommandKind; 20] = [
        CommandKind::Get,
        CommandKind::Set,
        CommandKind::GetAll,
        CommandKind::Keys,
        CommandKind::Update,
        CommandKind::Remove,
        CommandKind::Find,
        CommandKind::Clear,
        CommandKind::HSet,
        CommandKind::HGetAll,
        CommandKind::HGet,
        CommandKind::HVal,
        CommandKind::HRemove,
        CommandKind::HKeys,
        CommandKind::LAdd,
        CommandKind::LGetAll,
        CommandKind::LRemove,
        CommandKind::LCount,
        CommandKind::Replay,
        CommandKind::Sync,
    ];
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Whether commands of this kind take part in replay reconstruction.
///
/// Only state-writing kinds qualify. Reads and the two control kinds never do.
pub fn can_replay(kind: CommandKind) -> bool {
    match kind {
        CommandKind::Set
        | CommandKind::Update
        | CommandKind::Remove
        | CommandKind::Clear
        | CommandKind::HSet
        | CommandKind::HRemove
        | CommandKind::LAdd
        | CommandKind::LRemove => true,
        CommandKind::Get
        | CommandKind::GetAll
        | CommandKind::Keys
        | CommandKind::Find
        | CommandKind::HGetAll
        | CommandKind::HGet
        | CommandKind::HVal
        | CommandKind::HKeys
        | CommandKind::LGetAll
        | CommandKind::LCount
        | CommandKind::Replay
        | CommandKind::Sync => false,
    }
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Get { .. } => CommandKind::Get,
            Command::Set { .. } => CommandKind::Set,
            Command::GetAll => CommandKind::GetAll,
            Command::Keys => CommandKind::Keys,
            Command::Update { .. } => CommandKind::Update,
            Command::Remove { .. } => CommandKind::Remove,
            Command::Find { .. } => CommandKind::Find,
            Command::Clear => CommandKind::Clear,
            Command::HSet { .. } => CommandKind::HSet,
            Command::HGetAll { .. } => CommandKind::HGetAll,
            Command::HGet { .. } => CommandKind::HGet,
            Command::HVal { .. } => CommandKind::HVal,
            Command::HRemove { .. } => CommandKind::HRemove,
            Command::HKeys { .. } => CommandKind::HKeys,
            Command::LAdd { .. } => CommandKind::LAdd,
            Command::LGetAll { .. } => CommandKind::LGetAll,
            Command::LRemove { .. } => CommandKind::LRemove,
            Command::LCount { .. } => CommandKind::LCount,
            Command::Replay { .. } => CommandKind::Replay,
            Command::Sync { .. } => CommandKind::Sync,
        }
    }

    /// The key that decides which node owns this command.
    ///
    /// `None` for broadcast-class commands and control commands.
    pub fn key(&self) -> Option<&str> {
        match self {
            Command::Get { key }
            | Command::Set { key, .. }
            | Command::Update { key, .. }
            | Command::Remove { key }
            | Command::Find { key }
            | Command::HSet { key, .. }
            | Command::HGetAll { key }
            | Command::HGet { key, .. }
            | Command::HVal { key }
            | Command::HRemove { key, .. }
            | Command::HKeys { key }
            | Command::LAdd { key, .. }
            | Command::LGetAll { key }
            | Command::LRemove { key, .. }
            | Command::LCount { key } => Some(key.as_str()),
            Command::GetAll
            | Command::Keys
            | Command::Clear
            | Command::Replay { .. }
            | Command::Sync { .. } => None,
        }
    }

    pub fn can_replay(&self) -> bool {
        can_replay(self.kind())
    }

    /// `Sync` and `Replay` are only ever built by the manager
    pub fn is_control(&self) -> bool {
        matches!(self, Command::Replay { .. } | Command::Sync { .. })
    }
}
