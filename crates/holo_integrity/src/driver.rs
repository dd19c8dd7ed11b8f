//! Fan-out of pipeline runners across independent connections.

use anyhow::Context;
use rand::Rng;

use crate::config::{worker_seed, RunConfig};
use crate::report::Reporter;
use crate::runner::{PipelineRunner, RunnerConfig, WorkerSummary};
use crate::transport::Connector;

/// Connect every worker, run them concurrently, and wait for all of them.
///
/// A connect failure aborts the run before any command is issued. Anomalies
/// never fail the run; they only reach `reporter`.
pub async fn run<K: Connector>(
    config: &RunConfig,
    connector: K,
    reporter: Reporter,
) -> anyhow::Result<Vec<WorkerSummary>> {
    config.validate()?;
    let plan = config.worker_plan();
    let dropped = config.dropped_requests();
    if dropped > 0 {
        tracing::warn!(
            dropped,
            total_requests = config.total_requests,
            "total requests do not divide evenly across connections and iterations"
        );
    }

    // Use a random seed when the user provides zero.
    let seed = if config.seed == 0 {
        rand::thread_rng().gen()
    } else {
        config.seed
    };
    tracing::info!(
        endpoint = %config.endpoint,
        connections = config.connections,
        pipeline_depth = config.pipeline_depth,
        iterations = config.iterations,
        requests_per_iteration = plan.requests_per_iteration,
        write_ratio = config.write_ratio,
        seed,
        "starting integrity run"
    );

    let mut conns = Vec::with_capacity(config.connections);
    for worker in 0..config.connections {
        let conn = connector
            .connect()
            .await
            .with_context(|| format!("worker {worker}: connect to {}", config.endpoint))?;
        conns.push(conn);
    }

    let mut tasks = Vec::with_capacity(conns.len());
    for (worker, conn) in conns.into_iter().enumerate() {
        let runner_config = RunnerConfig {
            worker,
            write_ratio: config.write_ratio,
            key_prefix: config.key_prefix.clone(),
            seed: worker_seed(seed, worker),
        };
        let runner = PipelineRunner::new(conn, runner_config, reporter.clone());
        tasks.push(tokio::spawn(runner.run(plan)));
    }
    drop(reporter);

    let mut summaries = Vec::with_capacity(tasks.len());
    for task in tasks {
        let summary = task.await.context("worker task panicked")?;
        tracing::debug!(
            worker = summary.worker,
            commands = summary.commands,
            writes = summary.writes,
            reads = summary.reads,
            anomalies = summary.anomalies,
            oracle = summary.oracle_len,
            "worker finished"
        );
        summaries.push(summary);
    }
    Ok(summaries)
}
