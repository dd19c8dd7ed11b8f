//! Reply shapes and their classification against the queued command.

use std::fmt;

use bytes::Bytes;
use redis_protocol::resp2::types::BytesFrame;

use crate::command::{CommandKind, PendingCommand};

/// Acknowledgment a store must send for every `SET`.
pub const WRITE_ACK: &str = "OK";

/// A store reply reduced to the shapes reconciliation cares about.
///
/// Status and bulk payloads keep their wire bytes; text is only produced for
/// display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Status(Bytes),
    Value(Bytes),
    Nil,
    Error(String),
    Integer(i64),
    Array(usize),
}

impl Reply {
    /// Short shape name used in anomaly reports.
    pub fn shape(&self) -> &'static str {
        match self {
            Reply::Status(_) => "status",
            Reply::Value(_) => "bulk",
            Reply::Nil => "nil",
            Reply::Error(_) => "error",
            Reply::Integer(_) => "integer",
            Reply::Array(_) => "array",
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Status(b) | Reply::Value(b) => f.write_str(&render_bytes(b)),
            Reply::Error(s) => f.write_str(s),
            Reply::Nil => f.write_str("NIL"),
            Reply::Integer(n) => write!(f, "{n}"),
            Reply::Array(len) => write!(f, "array[{len}]"),
        }
    }
}

impl From<BytesFrame> for Reply {
    fn from(frame: BytesFrame) -> Self {
        match frame {
            BytesFrame::SimpleString(s) => Reply::Status(s),
            BytesFrame::BulkString(b) => Reply::Value(b),
            BytesFrame::Null => Reply::Nil,
            BytesFrame::Error(err) => Reply::Error(err.to_string()),
            BytesFrame::Integer(n) => Reply::Integer(n),
            BytesFrame::Array(items) => Reply::Array(items.len()),
        }
    }
}

/// Verdict for one reply paired with its command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Confirmed,
    Mismatch { expected: String, actual: String },
    Missing { expected: String },
    MalformedReply { detail: String },
}

/// Classify `reply` against the command that produced it.
pub fn reconcile(cmd: &PendingCommand, reply: &Reply) -> Outcome {
    match cmd.kind {
        CommandKind::Write => match reply {
            Reply::Status(s) if s.as_ref() == WRITE_ACK.as_bytes() => Outcome::Confirmed,
            Reply::Status(s) => Outcome::Mismatch {
                expected: WRITE_ACK.to_string(),
                actual: render_bytes(s),
            },
            other => malformed(cmd.kind, other),
        },
        CommandKind::Read => {
            let expected = cmd.expected.clone().unwrap_or_default();
            match reply {
                Reply::Value(v) if v.as_ref() == expected.as_bytes() => Outcome::Confirmed,
                Reply::Value(v) => Outcome::Mismatch {
                    expected,
                    actual: render_bytes(v),
                },
                Reply::Nil => Outcome::Missing { expected },
                other => malformed(cmd.kind, other),
            }
        }
    }
}

/// UTF-8 payloads as-is, anything else with non-printable bytes escaped.
fn render_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.escape_ascii().to_string(),
    }
}

fn malformed(kind: CommandKind, reply: &Reply) -> Outcome {
    Outcome::MalformedReply {
        detail: format!("unexpected {} reply to {}: {reply}", reply.shape(), kind.verb()),
    }
}
