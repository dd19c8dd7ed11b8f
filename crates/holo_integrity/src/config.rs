//! Run configuration shared by the CLI and the library entry points.

use crate::keygen::DEFAULT_KEY_PREFIX;
use crate::report::ReportFormat;
use crate::runner::WorkerPlan;

/// Golden-ratio multiplier used to spread per-worker seeds.
const SEED_MIX: u64 = 0x9e37_79b9_7f4a_7c15;

#[derive(Clone, Debug)]
pub struct RunConfig {
    /// RESP endpoint as `host:port`.
    pub endpoint: String,
    /// Commands per pipelined batch.
    pub pipeline_depth: usize,
    /// Parallel workers, one connection each.
    pub connections: usize,
    /// Commands across all workers and iterations.
    pub total_requests: usize,
    /// Probability in `[0, 1]` that a command is a write.
    pub write_ratio: f64,
    pub iterations: usize,
    /// Base RNG seed; 0 picks one at random.
    pub seed: u64,
    pub key_prefix: String,
    pub report_format: ReportFormat,
}

impl RunConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            pipeline_depth: 16,
            connections: 4,
            total_requests: 10_000,
            write_ratio: 0.5,
            iterations: 1,
            seed: 0,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            report_format: ReportFormat::Text,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.endpoint.trim().is_empty(), "--endpoint must not be empty");
        anyhow::ensure!(self.pipeline_depth > 0, "--pipeline-depth must be > 0");
        anyhow::ensure!(self.connections > 0, "--connections must be > 0");
        anyhow::ensure!(self.iterations > 0, "--iterations must be > 0");
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.write_ratio),
            "--write-ratio must be within [0, 1], got {}",
            self.write_ratio
        );
        Ok(())
    }

    /// Split the total command count evenly across workers and iterations.
    ///
    /// Integer division: a remainder that does not divide evenly is not issued.
    pub fn worker_plan(&self) -> WorkerPlan {
        let per_worker = self.total_requests / self.connections.max(1);
        let per_iteration = per_worker / self.iterations.max(1);
        WorkerPlan {
            iterations: self.iterations,
            requests_per_iteration: per_iteration,
            pipeline_depth: self.pipeline_depth,
        }
    }

    /// Commands the plan leaves out because of integer division.
    pub fn dropped_requests(&self) -> usize {
        let plan = self.worker_plan();
        self.total_requests - plan.total_commands() * self.connections
    }
}

/// Mix the base seed with the worker id for an independent per-worker stream.
pub fn worker_seed(base: u64, worker: usize) -> u64 {
    base ^ (worker as u64).wrapping_mul(SEED_MIX)
}
