//! JSON-lines command files
//!
//! Both the manager WAL and each storage node's replay file hold one encoded
//! [`Command`] per line. Blank lines are ignored. Reading stops at the first
//! undecodable line, keeping everything before it.

use crate::common::codec::{decode_command, encode_command};
use crate::common::command::Command;
use crate::common::Result;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Read every command in the file, in order. A missing file reads as empty.
pub async fn read_commands(path: impl AsRef<Path>) -> Result<Vec<Command>> {
    let path = path.as_ref();
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut commands = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        match decode_command(line) {
            Ok(command) => commands.push(command),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    line = line_no + 1,
                    "command log read stopped at corrupted entry: {}",
                    e
                );
                break;
            }
        }
    }

    Ok(commands)
}

/// Replace the file's content with `commands`.
///
/// Written to a sibling temp file first and renamed over the target, so a
/// reader never observes a half-written log.
pub async fn replace_commands(path: impl AsRef<Path>, commands: &[Command]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut buf = String::new();
    for command in commands {
        buf.push_str(&encode_command(command)?);
        buf.push('\n');
    }

    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, buf).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Append one command line to an open file. Returns the bytes written.
pub async fn append_command(file: &mut tokio::fs::File, command: &Command) -> Result<u64> {
    let mut line = encode_command(command)?;
    line.push('\n');
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;
    Ok(line.len() as u64)
}

/// Cut the file back to the end of its last complete, decodable line.
///
/// A crash mid-append leaves a partial record; appending after it would
/// hide every later command from [`read_commands`]. Returns the length the
/// file was cut to. A missing file is left alone.
pub async fn truncate_torn_tail(path: impl AsRef<Path>) -> Result<u64> {
    let path = path.as_ref();
    let content = match tokio::fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let keep = valid_prefix_len(&content) as u64;
    if keep < content.len() as u64 {
        let file = tokio::fs::OpenOptions::new().write(true).open(path).await?;
        file.set_len(keep).await?;
        file.sync_all().await?;
        tracing::warn!(
            path = %path.display(),
            dropped = content.len() as u64 - keep,
            "truncated torn command log tail"
        );
    }
    Ok(keep)
}

/// Byte length of the leading run of newline-terminated lines that are
/// blank or decode as a command
fn valid_prefix_len(content: &[u8]) -> usize {
    let mut keep = 0;
    while let Some(pos) = content[keep..].iter().position(|&b| b == b'\n') {
        let line = &content[keep..keep + pos];
        let valid = match std::str::from_utf8(line) {
            Ok(text) => {
                let text = text.trim_end();
                text.is_empty() || decode_command(text).is_ok()
            }
            Err(_) => false,
        };
        if !valid {
            break;
        }
        keep += pos + 1;
    }
    keep
}
