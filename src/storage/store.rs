//! In-memory data store of a storage node
//!
//! Executes data commands against a map of typed values and renders the
//! textual reply. Pure and deterministic: the same command sequence on an
//! empty store always yields the same state and replies.

use crate::common::Command;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Str(String),
    Hash(BTreeMap<String, String>),
    List(Vec<String>),
}

impl Value {
    /// Single-line rendering used by `getall` and `remove`
    pub fn display(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Hash(map) => map
                .iter()
                .map(|(f, v)| format!("({} {})", f, v))
                .collect::<Vec<_>>()
                .join(" "),
            Value::List(items) => items.join(" "),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Store {
    data: BTreeMap<String, Value>,
}

const NO_SUCH_ELEMENT: &str = "No such element in database";
const MISSING_KEY: &str = "Key does not exist";
const EMPTY_STORAGE: &str = "The storage is empty";

fn not_common(key: &str) -> String {
    format!("Type associated with key {} is not a common type", key)
}

fn not_hash(key: &str) -> String {
    format!("Type associated with key {} is not a hash-value type", key)
}

fn not_list(key: &str) -> String {
    format!("Type associated with key {} is not a list type", key)
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Execute a data command and return the reply text.
    ///
    /// Control commands are handled by the node, not the store.
    pub fn execute(&mut self, command: &Command) -> String {
        match command {
            Command::Get { key } => self.get(key),
            Command::Set { key, value } => self.set(key, value),
            Command::GetAll => self.get_all(),
            Command::Keys => self.keys(),
            Command::Update { key, value } => self.update(key, value),
            Command::Remove { key } => self.remove(key),
            Command::Find { key } => self.find(key),
            Command::Clear => {
                self.data.clear();
                "Database has been cleared".to_string()
            }
            Command::HSet { key, field, value } => self.hset(key, field, value),
            Command::HGetAll { key } => self.with_hash(key, |map| {
                map.iter()
                    .map(|(f, v)| format!("({} {})", f, v))
                    .collect::<Vec<_>>()
                    .join("\n")
            }),
            Command::HGet { key, field } => self.with_hash(key, |map| match map.get(field) {
                Some(value) => value.clone(),
                None => format!("No such element in database associated with key {}", key),
            }),
            Command::HVal { key } => self.with_hash(key, |map| {
                map.values()
                    .map(|v| format!("({})", v))
                    .collect::<Vec<_>>()
                    .join("\n")
            }),
            Command::HKeys { key } => self.with_hash(key, |map| {
                map.keys()
                    .map(|f| format!("({})", f))
                    .collect::<Vec<_>>()
                    .join("\n")
            }),
            Command::HRemove { key, field } => self.hremove(key, field),
            Command::LAdd { key, value } => self.ladd(key, value),
            Command::LGetAll { key } => self.with_list(key, |items| items.join(" ")),
            Command::LRemove { key, value } => self.lremove(key, value),
            Command::LCount { key } => self.with_list(key, |items| items.len().to_string()),
            Command::Replay { .. } | Command::Sync { .. } => {
                format!("Invalid command: {} is not a data command", command.kind())
            }
        }
    }

    fn get(&self, key: &str) -> String {
        match self.data.get(key) {
            Some(Value::Str(s)) => s.clone(),
            Some(_) => not_common(key),
            None => MISSING_KEY.to_string(),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> String {
        if self.data.contains_key(key) {
            return "Key already exists".to_string();
        }
        self.data
            .insert(key.to_string(), Value::Str(value.to_string()));
        value.to_string()
    }

    fn get_all(&self) -> String {
        if self.data.is_empty() {
            return EMPTY_STORAGE.to_string();
        }
        self.data
            .iter()
            .map(|(k, v)| format!("Key: {} Value: {}", k, v.display()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn keys(&self) -> String {
        if self.data.is_empty() {
            return EMPTY_STORAGE.to_string();
        }
        self.data.keys().cloned().collect::<Vec<_>>().join("\n")
    }

    fn update(&mut self, key: &str, value: &str) -> String {
        match self.data.get_mut(key) {
            Some(Value::Str(s)) => {
                *s = value.to_string();
                "Updated".to_string()
            }
            Some(_) => not_common(key),
            None => NO_SUCH_ELEMENT.to_string(),
        }
    }

    fn remove(&mut self, key: &str) -> String {
        match self.data.remove(key) {
            Some(value) => format!("{} removed", value.display()),
            None => NO_SUCH_ELEMENT.to_string(),
        }
    }

    fn find(&self, key: &str) -> String {
        if self.data.contains_key(key) {
            format!("The element with key {} is in database", key)
        } else {
            NO_SUCH_ELEMENT.to_string()
        }
    }

    fn hset(&mut self, key: &str, field: &str, value: &str) -> String {
        let added = format!(
            "{} {} pair has been added to hash map associated with key {}",
            field, value, key
        );
        match self.data.get_mut(key) {
            Some(Value::Hash(map)) => {
                if map.contains_key(field) {
                    return format!(
                        "Hash map associated with key {} already have key {}",
                        key, field
                    );
                }
                map.insert(field.to_string(), value.to_string());
                added
            }
            Some(_) => not_hash(key),
            None => {
                let map = BTreeMap::from([(field.to_string(), value.to_string())]);
                self.data.insert(key.to_string(), Value::Hash(map));
                added
            }
        }
    }

    fn hremove(&mut self, key: &str, field: &str) -> String {
        match self.data.get_mut(key) {
            Some(Value::Hash(map)) => match map.remove(field) {
                Some(value) => format!("{} removed", value),
                None => format!("No such element in database associated with key {}", key),
            },
            Some(_) => not_hash(key),
            None => MISSING_KEY.to_string(),
        }
    }

    fn ladd(&mut self, key: &str, value: &str) -> String {
        let added = format!("{} has been added to list associated with key {}", value, key);
        match self.data.get_mut(key) {
            Some(Value::List(items)) => {
                if items.iter().any(|item| item == value) {
                    return format!(
                        "List associated with key {} already have element {}",
                        key, value
                    );
                }
                items.push(value.to_string());
                added
            }
            Some(_) => not_list(key),
            None => {
                self.data
                    .insert(key.to_string(), Value::List(vec![value.to_string()]));
                added
            }
        }
    }

    fn lremove(&mut self, key: &str, value: &str) -> String {
        match self.data.get_mut(key) {
            Some(Value::List(items)) => match items.iter().position(|item| item == value) {
                Some(idx) => {
                    items.remove(idx);
                    format!(
                        "{} has been removed from list associated with key {}",
                        value, key
                    )
                }
                None => format!(
                    "List associated with key {} don't have element {}",
                    key, value
                ),
            },
            Some(_) => not_list(key),
            None => MISSING_KEY.to_string(),
        }
    }

    fn with_hash(&self, key: &str, f: impl FnOnce(&BTreeMap<String, String>) -> String) -> String {
        match self.data.get(key) {
            Some(Value::Hash(map)) => f(map),
            Some(_) => not_hash(key),
            None => MISSING_KEY.to_string(),
        }
    }

    fn with_list(&self, key: &str, f: impl FnOnce(&[String]) -> String) -> String {
        match self.data.get(key) {
            Some(Value::List(items)) => f(items),
            Some(_) => not_list(key),
            None => MISSING_KEY.to_string(),
        }
    }
}
