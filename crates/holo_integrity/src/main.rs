//! Data-integrity exerciser for RESP key-value stores.
//!
//! Workers pipeline SET/GET batches over their own connection, verify every
//! reply against a private oracle, and stream anomalies to stderr. The exit
//! code is 0 whenever all workers finish; anomalies are diagnostics only.

use std::io::IsTerminal;

use clap::{Parser, Subcommand};
use holo_integrity::keygen::DEFAULT_KEY_PREFIX;
use holo_integrity::report::{join_writer, spawn_writer};
use holo_integrity::{driver, ReportFormat, Reporter, RespConnector, RunConfig};

/// CLI entry point wrapper.
#[derive(Parser, Debug)]
#[command(name = "holo-integrity")]
struct Args {
    #[command(subcommand)]
    cmd: Command,
}

/// Top-level CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    Run(RunArgs),
}

/// CLI options for an integrity run.
#[derive(Parser, Debug, Clone)]
struct RunArgs {
    /// RESP endpoint, e.g. `127.0.0.1:6379`.
    #[arg(long)]
    endpoint: String,

    /// Commands sent per pipelined batch before replies are drained.
    #[arg(long, default_value_t = 16)]
    pipeline_depth: usize,

    /// Number of parallel workers (each worker uses one TCP connection).
    #[arg(long, default_value_t = 4)]
    connections: usize,

    /// Total commands across all workers and iterations.
    #[arg(long, default_value_t = 10_000)]
    total_requests: usize,

    /// Fraction of commands that are SET (rest are GET), within [0, 1].
    #[arg(long, default_value_t = 0.5)]
    write_ratio: f64,

    /// Number of iterations each worker splits its share into.
    #[arg(long, default_value_t = 1)]
    iterations: usize,

    /// Random seed (0 picks a random seed).
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Prefix for generated keys.
    #[arg(long, default_value = DEFAULT_KEY_PREFIX)]
    key_prefix: String,

    /// Encoding of anomaly lines written to stderr.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    report_format: ReportFormat,
}

impl From<RunArgs> for RunConfig {
    fn from(args: RunArgs) -> Self {
        RunConfig {
            endpoint: args.endpoint,
            pipeline_depth: args.pipeline_depth,
            connections: args.connections,
            total_requests: args.total_requests,
            write_ratio: args.write_ratio,
            iterations: args.iterations,
            seed: args.seed,
            key_prefix: args.key_prefix,
            report_format: args.report_format,
        }
    }
}

#[tokio::main]
/// Parse CLI args, initialize logging, and dispatch to the selected subcommand.
async fn main() -> anyhow::Result<()> {
    // Enable ANSI colors only when stdout is a terminal and NO_COLOR is unset.
    let ansi = std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
    tracing_subscriber::fmt()
        .with_ansi(ansi)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    match args.cmd {
        Command::Run(args) => run(args.into()).await,
    }
}

/// Run all workers and wait for the report writer to drain.
async fn run(config: RunConfig) -> anyhow::Result<()> {
    config.validate()?;
    let (reporter, rx) = Reporter::channel();
    let writer = spawn_writer(rx, config.report_format, std::io::stderr());

    let connector = RespConnector::new(config.endpoint.clone());
    let summaries = driver::run(&config, connector, reporter).await?;

    // Workers already finished; a broken report sink does not change the exit code.
    join_writer(writer).await;
    let commands: u64 = summaries.iter().map(|s| s.commands).sum();
    let anomalies: u64 = summaries.iter().map(|s| s.anomalies).sum();
    tracing::info!(
        workers = summaries.len(),
        commands,
        anomalies,
        "all requests processed"
    );
    Ok(())
}
