//! Framing for the manager ↔ storage link
//!
//! One JSON document per line. Commands travel manager → node, plain JSON
//! strings travel back. Embedded newlines are escaped by JSON, so a line is
//! always a whole message.

use crate::common::command::{Command, CommandKind};
use crate::common::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

const LINE_ENDINGS: &[char] = &['\n', '\r'];

/// Read the next framed message, `None` on a clean EOF
pub async fn read_message<R, T>(reader: &mut R) -> Result<Option<T>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    match read_frame(reader).await? {
        Some(line) => Ok(Some(serde_json::from_str(&line)?)),
        None => Ok(None),
    }
}

/// Like [`read_message`] for commands, reporting unknown kinds distinctly
pub async fn read_command<R>(reader: &mut R) -> Result<Option<Command>>
where
    R: AsyncBufRead + Unpin,
{
    match read_frame(reader).await? {
        Some(line) => decode_command(&line).map(Some),
        None => Ok(None),
    }
}

async fn read_frame<R>(reader: &mut R) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        let bytes = reader.read_line(&mut line).await?;
        if bytes == 0 {
            return Ok(None);
        }

        let trimmed = line.trim_end_matches(LINE_ENDINGS);
        if !trimmed.is_empty() {
            return Ok(Some(trimmed.to_string()));
        }
    }
}

pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let mut encoded = serde_json::to_vec(message)?;
    encoded.push(b'\n');
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}

/// Decode one command line, naming the kind when it is not one we know
pub fn decode_command(line: &str) -> Result<Command> {
    match serde_json::from_str::<Command>(line) {
        Ok(command) => Ok(command),
        Err(err) => {
            let value: serde_json::Value = serde_json::from_str(line)?;
            match value.get("kind").and_then(|k| k.as_str()) {
                Some(kind) if !is_known_kind(kind) => {
                    Err(Error::UnknownCommandKind(kind.to_string()))
                }
                _ => Err(err.into()),
            }
        }
    }
}

pub fn encode_command(command: &Command) -> Result<String> {
    Ok(serde_json::to_string(command)?)
}

fn is_known_kind(name: &str) -> bool {
    CommandKind::ALL.iter().any(|kind| kind.to_string() == name)
}
