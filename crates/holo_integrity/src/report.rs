//! Anomaly reports and the single sink every worker writes through.
//!
//! Workers hold a cloned `Reporter` and never touch the output directly. One
//! writer drains the channel, so each report lands as a whole line no matter
//! how many workers are reporting at once.

use std::fmt;
use std::io::Write;

use anyhow::Context;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::command::{CommandKind, PendingCommand};
use crate::reply::{Outcome, Reply};

/// Category of a detected anomaly.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Mismatch,
    Missing,
    MalformedReply,
    TransportError,
}

/// One observed contradiction between the store and the oracle.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Anomaly {
    pub worker: usize,
    pub kind: AnomalyKind,
    pub op: CommandKind,
    pub key: String,
    pub expected: Option<String>,
    pub observed: String,
    pub shape: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Anomaly {
    /// Build a report for a reconciled reply. Confirmed replies report nothing.
    pub fn from_outcome(
        worker: usize,
        cmd: &PendingCommand,
        reply: &Reply,
        outcome: Outcome,
    ) -> Option<Self> {
        let (kind, expected, detail) = match outcome {
            Outcome::Confirmed => return None,
            Outcome::Mismatch { expected, .. } => (AnomalyKind::Mismatch, Some(expected), None),
            Outcome::Missing { expected } => (AnomalyKind::Missing, Some(expected), None),
            Outcome::MalformedReply { detail } => (
                AnomalyKind::MalformedReply,
                Some(expected_for(cmd)),
                Some(detail),
            ),
        };
        Some(Self {
            worker,
            kind,
            op: cmd.kind,
            key: cmd.key.clone(),
            expected,
            observed: reply.to_string(),
            shape: reply.shape().to_string(),
            detail,
        })
    }

    /// Build a report for a command whose reply never arrived.
    pub fn transport(worker: usize, cmd: &PendingCommand, err: &anyhow::Error) -> Self {
        Self {
            worker,
            kind: AnomalyKind::TransportError,
            op: cmd.kind,
            key: cmd.key.clone(),
            expected: Some(expected_for(cmd)),
            observed: format!("{err:#}"),
            shape: "transport".to_string(),
            detail: None,
        }
    }
}

fn expected_for(cmd: &PendingCommand) -> String {
    match cmd.kind {
        CommandKind::Write => crate::reply::WRITE_ACK.to_string(),
        CommandKind::Read => cmd.expected.clone().unwrap_or_default(),
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = self.op.verb();
        match (self.kind, self.op) {
            (AnomalyKind::Mismatch, CommandKind::Read) => write!(f, "Data mismatch")?,
            (AnomalyKind::Mismatch, CommandKind::Write) => {
                write!(f, "Invalid reply for {verb} command")?
            }
            (AnomalyKind::Missing, _) => write!(f, "Data missing")?,
            (AnomalyKind::MalformedReply, _) => write!(f, "Invalid reply type for {verb} command")?,
            (AnomalyKind::TransportError, _) => write!(f, "No reply for {verb} command")?,
        }
        write!(f, " for key: {}", self.key)?;
        if let Some(expected) = &self.expected {
            write!(f, " | Expected: {expected}")?;
        }
        write!(
            f,
            " | Response: {} [reply type: {}] (worker {}, {verb})",
            self.observed, self.shape, self.worker
        )
    }
}

/// Output encoding for anomaly lines.
#[derive(clap::ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// Reports buffered between workers and the writer before senders wait.
pub const REPORT_CHANNEL_CAPACITY: usize = 4096;

/// Cloneable handle workers report through.
#[derive(Clone, Debug)]
pub struct Reporter {
    tx: mpsc::Sender<Anomaly>,
}

impl Reporter {
    /// Create a reporter and the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::Receiver<Anomaly>) {
        Self::with_capacity(REPORT_CHANNEL_CAPACITY)
    }

    /// Like `channel`, with `capacity` reports buffered ahead of the writer.
    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<Anomaly>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Hand `anomaly` to the writer, waiting while the channel is full.
    pub async fn report(&self, anomaly: Anomaly) {
        if self.tx.send(anomaly).await.is_err() {
            tracing::warn!("report sink closed; dropping anomaly");
        }
    }
}

/// Drain `rx` into `out` on a blocking thread until every `Reporter` is dropped.
///
/// Resolves to the number of lines written and the writer itself.
pub fn spawn_writer<W>(
    mut rx: mpsc::Receiver<Anomaly>,
    format: ReportFormat,
    mut out: W,
) -> JoinHandle<anyhow::Result<(u64, W)>>
where
    W: Write + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut written = 0u64;
        while let Some(anomaly) = rx.blocking_recv() {
            write_line(&mut out, format, &anomaly)?;
            written += 1;
        }
        out.flush().context("flush report sink")?;
        Ok((written, out))
    })
}

/// Wait for a writer started by `spawn_writer`.
///
/// Returns the number of lines written. A panicked writer or a failed sink is
/// logged and yields `None`.
pub async fn join_writer<W>(writer: JoinHandle<anyhow::Result<(u64, W)>>) -> Option<u64> {
    match writer.await.context("report writer panicked") {
        Ok(Ok((written, _))) => {
            tracing::debug!(written, "report writer drained");
            Some(written)
        }
        Ok(Err(err)) | Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "anomaly reports incomplete");
            None
        }
    }
}

fn write_line<W: Write>(out: &mut W, format: ReportFormat, anomaly: &Anomaly) -> anyhow::Result<()> {
    match format {
        ReportFormat::Text => writeln!(out, "{anomaly}").context("write report")?,
        ReportFormat::Json => {
            let line = serde_json::to_string(anomaly).context("serialize anomaly")?;
            writeln!(out, "{line}").context("write report")?;
        }
    }
    Ok(())
}
