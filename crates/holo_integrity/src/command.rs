//! Commands queued in a pipelined batch.

use serde::Serialize;

use crate::keygen::derive_value;

/// Operation kind of a queued command.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Write,
    Read,
}

impl CommandKind {
    /// Protocol verb used on the wire.
    pub fn verb(self) -> &'static str {
        match self {
            CommandKind::Write => "SET",
            CommandKind::Read => "GET",
        }
    }
}

/// A command awaiting its reply.
///
/// Reads carry the value the oracle held when the read was composed; writes
/// carry nothing beyond the key because their value is `derive_value(key)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    pub kind: CommandKind,
    pub key: String,
    pub expected: Option<String>,
}

impl PendingCommand {
    /// A SET of `key`; its value is derived from the key.
    pub fn write(key: String) -> Self {
        Self {
            kind: CommandKind::Write,
            key,
            expected: None,
        }
    }

    /// A GET of `key` that must return exactly `expected`.
    pub fn read(key: String, expected: String) -> Self {
        Self {
            kind: CommandKind::Read,
            key,
            expected: Some(expected),
        }
    }

    /// Request to put on the wire for this command.
    pub fn request(&self) -> Request {
        match self.kind {
            CommandKind::Write => Request::Set {
                key: self.key.clone(),
                value: derive_value(&self.key),
            },
            CommandKind::Read => Request::Get {
                key: self.key.clone(),
            },
        }
    }
}

/// Store request independent of the wire encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Get { key: String },
    Set { key: String, value: String },
}

impl Request {
    /// Key the request targets.
    pub fn key(&self) -> &str {
        match self {
            Request::Get { key } | Request::Set { key, .. } => key,
        }
    }
}
