//! Client command parsing
//!
//! Turns one request line (`set user ada`, `HGET user name`, ...) into a
//! [`Command`]. Keywords are case-insensitive, arguments are kept verbatim.
//! Control commands (`Sync`, `Replay`) have no text form.

use crate::common::command::Command;
use std::fmt;

const INVALID_COMMAND: &str = "Invalid command";

/// Accumulated parse failures for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub messages: Vec<String>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.messages.join("\n"))
    }
}

impl std::error::Error for ParseError {}

/// Parse a single request line
pub fn parse(input: &str) -> Result<Command, ParseError> {
    Parser::new(input).parse()
}

struct Parser<'a> {
    tokens: std::str::SplitWhitespace<'a>,
    errors: Vec<String>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            tokens: input.split_whitespace(),
            errors: Vec::new(),
        }
    }

    fn parse(mut self) -> Result<Command, ParseError> {
        let command = self.command();
        if command.is_some() {
            self.expect_end();
        }

        match command {
            Some(command) if self.errors.is_empty() => Ok(command),
            _ => {
                if self.errors.is_empty() {
                    self.errors.push(INVALID_COMMAND.to_string());
                }
                Err(ParseError {
                    messages: self.errors,
                })
            }
        }
    }

    fn command(&mut self) -> Option<Command> {
        let keyword = self.word()?.to_lowercase();

        let command = match keyword.as_str() {
            "getall" => Command::GetAll,
            "keys" => Command::Keys,
            "clear" => Command::Clear,
            "get" => Command::Get { key: self.word()? },
            "set" => {
                let (key, value) = self.key_value()?;
                Command::Set { key, value }
            }
            "update" => {
                let (key, value) = self.key_value()?;
                Command::Update { key, value }
            }
            "remove" => Command::Remove { key: self.word()? },
            "find" => Command::Find { key: self.word()? },
            "hset" => {
                let key = self.word()?;
                let field = self.word()?;
                let value = self.word()?;
                Command::HSet { key, field, value }
            }
            "hgetall" => Command::HGetAll { key: self.word()? },
            "hget" => {
                let (key, field) = self.key_value()?;
                Command::HGet { key, field }
            }
            "hval" => Command::HVal { key: self.word()? },
            "hremove" => {
                let (key, field) = self.key_value()?;
                Command::HRemove { key, field }
            }
            "hkeys" => Command::HKeys { key: self.word()? },
            "ladd" => {
                let (key, value) = self.key_value()?;
                Command::LAdd { key, value }
            }
            "lgetall" => Command::LGetAll { key: self.word()? },
            "lremove" => {
                let (key, value) = self.key_value()?;
                Command::LRemove { key, value }
            }
            "lcount" => Command::LCount { key: self.word()? },
            _ => {
                self.errors.push(INVALID_COMMAND.to_string());
                return None;
            }
        };

        Some(command)
    }

    fn word(&mut self) -> Option<String> {
        match self.tokens.next() {
            Some(token) => Some(token.to_string()),
            None => {
                self.errors.push(INVALID_COMMAND.to_string());
                None
            }
        }
    }

    fn key_value(&mut self) -> Option<(String, String)> {
        let key = self.word()?;
        let value = self.word()?;
        Some((key, value))
    }

    fn expect_end(&mut self) {
        if let Some(extra) = self.tokens.next() {
            self.errors.push(format!("expected <EOF>, got `{}`", extra));
        }
    }
}
