//! Per-worker pipelined submit/drain/reconcile loop.
//!
//! A batch moves through three strictly sequential phases on the worker's own
//! connection:
//! 1) compose `b` commands from the oracle and the write ratio,
//! 2) submit all of them and flush once,
//! 3) drain exactly `b` replies, popping the oldest pending command for each.
//!
//! Replies carry no request id. Pairing is purely positional and relies on the
//! connection answering in submission order.

use std::collections::VecDeque;

use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::command::{CommandKind, PendingCommand};
use crate::composer::BatchComposer;
use crate::keygen::KeyGenerator;
use crate::oracle::Oracle;
use crate::reply::reconcile;
use crate::report::{Anomaly, Reporter};
use crate::transport::Connection;

/// How many commands a worker issues and how it slices them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerPlan {
    pub iterations: usize,
    pub requests_per_iteration: usize,
    pub pipeline_depth: usize,
}

impl WorkerPlan {
    /// Batch sizes for one iteration; the last batch may be short.
    pub fn batch_sizes(&self) -> impl Iterator<Item = usize> {
        let total = self.requests_per_iteration;
        let depth = self.pipeline_depth.max(1);
        (0..total).step_by(depth).map(move |start| depth.min(total - start))
    }

    pub fn total_commands(&self) -> usize {
        self.iterations * self.requests_per_iteration
    }
}

/// Per-worker knobs that shape the command mix.
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Worker id, carried into keys and reports.
    pub worker: usize,
    /// Probability that a slot becomes a SET, within [0, 1].
    pub write_ratio: f64,
    /// Prefix for every key this worker generates.
    pub key_prefix: String,
    /// Seed for this worker's RNG.
    pub seed: u64,
}

/// Counters a worker hands back to the driver when it finishes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub worker: usize,
    pub commands: u64,
    pub writes: u64,
    pub reads: u64,
    pub confirmed: u64,
    pub anomalies: u64,
    pub oracle_len: usize,
}

/// Drives one worker's batches over its own connection and oracle.
pub struct PipelineRunner<C> {
    worker: usize,
    conn: C,
    oracle: Oracle,
    keys: KeyGenerator,
    composer: BatchComposer,
    rng: SmallRng,
    reporter: Reporter,
    pending: VecDeque<PendingCommand>,
    summary: WorkerSummary,
}

impl<C: Connection> PipelineRunner<C> {
    pub fn new(conn: C, config: RunnerConfig, reporter: Reporter) -> Self {
        Self {
            worker: config.worker,
            conn,
            oracle: Oracle::new(),
            keys: KeyGenerator::new(config.key_prefix, config.worker),
            composer: BatchComposer::new(config.write_ratio),
            rng: SmallRng::seed_from_u64(config.seed),
            reporter,
            pending: VecDeque::new(),
            summary: WorkerSummary {
                worker: config.worker,
                ..WorkerSummary::default()
            },
        }
    }

    pub fn oracle(&self) -> &Oracle {
        &self.oracle
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    /// Run every iteration of `plan` to completion.
    pub async fn run(mut self, plan: WorkerPlan) -> WorkerSummary {
        for iteration in 1..=plan.iterations {
            tracing::info!(worker = self.worker, iteration, "iteration");
            for (batch, size) in plan.batch_sizes().enumerate() {
                tracing::debug!(worker = self.worker, iteration, batch, size, "batch");
                self.run_batch(size).await;
            }
        }
        self.finish()
    }

    /// Snapshot the counters, including the final oracle size.
    pub fn finish(mut self) -> WorkerSummary {
        self.summary.oracle_len = self.oracle.len();
        self.summary
    }

    /// Compose, submit, drain and reconcile one batch of `size` commands.
    pub async fn run_batch(&mut self, size: usize) {
        let batch = self
            .composer
            .compose(size, &mut self.oracle, &mut self.keys, &mut self.rng);
        for cmd in &batch {
            self.summary.commands += 1;
            match cmd.kind {
                CommandKind::Write => self.summary.writes += 1,
                CommandKind::Read => self.summary.reads += 1,
            }
        }
        if self.submit(batch).await {
            self.drain().await;
        }
    }

    /// Queue and flush the batch. On failure every command of the batch is
    /// reported and nothing is left pending.
    async fn submit(&mut self, batch: Vec<PendingCommand>) -> bool {
        debug_assert!(self.pending.is_empty(), "previous batch not drained");
        let mut batch = batch.into_iter();
        while let Some(cmd) = batch.next() {
            let submitted = self.conn.submit(&cmd.request()).await;
            self.pending.push_back(cmd);
            if let Err(err) = submitted {
                self.pending.extend(batch);
                self.abandon_pending(&err).await;
                return false;
            }
        }
        if let Err(err) = self.conn.flush().await {
            self.abandon_pending(&err).await;
            return false;
        }
        true
    }

    /// Receive one reply per pending command, oldest first.
    async fn drain(&mut self) {
        let mut position = 0usize;
        while let Some(cmd) = self.pending.pop_front() {
            match self.conn.receive_next().await {
                Ok(reply) => {
                    let outcome = reconcile(&cmd, &reply);
                    match Anomaly::from_outcome(self.worker, &cmd, &reply, outcome) {
                        Some(anomaly) => self.report(anomaly).await,
                        None => self.summary.confirmed += 1,
                    }
                }
                Err(err) => {
                    tracing::debug!(worker = self.worker, position, error = %err, "reply lost");
                    self.report(Anomaly::transport(self.worker, &cmd, &err)).await;
                }
            }
            position += 1;
        }
    }

    async fn abandon_pending(&mut self, err: &anyhow::Error) {
        tracing::debug!(
            worker = self.worker,
            pending = self.pending.len(),
            error = %err,
            "batch submission failed"
        );
        while let Some(cmd) = self.pending.pop_front() {
            let anomaly = Anomaly::transport(self.worker, &cmd, err);
            self.report(anomaly).await;
        }
    }

    async fn report(&mut self, anomaly: Anomaly) {
        self.summary.anomalies += 1;
        self.reporter.report(anomaly).await;
    }
}
