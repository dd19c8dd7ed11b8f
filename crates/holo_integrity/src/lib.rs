//! Pipelined data-integrity exerciser for RESP key-value stores.
//!
//! Each worker owns one connection and a private oracle of what it wrote. It
//! sends batches of `SET`/`GET` without waiting, drains the replies in
//! submission order, and reports every reply that contradicts the oracle.

pub mod command;
pub mod composer;
pub mod config;
pub mod driver;
pub mod keygen;
pub mod oracle;
pub mod reply;
pub mod report;
pub mod runner;
pub mod transport;

pub use command::{CommandKind, PendingCommand, Request};
pub use config::RunConfig;
pub use reply::{reconcile, Outcome, Reply};
pub use report::{Anomaly, AnomalyKind, ReportFormat, Reporter};
pub use runner::{PipelineRunner, RunnerConfig, WorkerPlan, WorkerSummary};
pub use transport::{Connection, Connector, RespConnection, RespConnector};
