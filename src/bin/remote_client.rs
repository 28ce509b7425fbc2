use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use clap::{error::ErrorKind, Parser};
use kv_loadgen::{
    client::RemoteClient,
    common::{TimeoutOptions, DEFAULT_KEY_SPACE},
    harness::{Harness, HarnessOptions},
    retry::{FailFast, FixedBackoff, RetryStrategy},
};
use tracing::{error, info, Level};

/// Populate a remote key-value store, then drive a read/write mix against
/// it while sampling throughput.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Server address.
    server_addr: String,

    /// Server port.
    server_port: u16,

    /// Number of operations in the measured workload.
    num_ops: u64,

    /// Percentage of operations that are reads (0-100).
    #[arg(value_parser = clap::value_parser!(u32).range(0..=100))]
    read_prob: u32,

    /// Number of keys to populate and address. Must match across runs
    /// against the same store.
    #[arg(long, env = "KV_SIZE", default_value_t = DEFAULT_KEY_SPACE)]
    key_space: usize,

    /// Throughput sampling period. (ms)
    #[arg(long, default_value_t = 10)]
    sample_period_ms: u64,

    /// Throughput results file.
    #[arg(long, default_value = "throughput.csv")]
    output: PathBuf,

    /// Seed for a reproducible operation sequence.
    #[arg(long)]
    seed: Option<u64>,

    /// Retries per failed store call. 0 aborts on the first failure.
    #[arg(long, default_value_t = 0)]
    retries: u32,

    /// Delay between retries. (ms)
    #[arg(long, default_value_t = 100)]
    retry_backoff_ms: u64,

    /// Read timeout per call. (ms)
    #[arg(long, default_value_t = 10_000)]
    read_timeout_ms: u64,

    /// Write timeout per call. (ms)
    #[arg(long, default_value_t = 10_000)]
    write_timeout_ms: u64,

    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,
}

fn parse_cli() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
            _ => {
                println!("{}", err);
                std::process::exit(1);
            }
        },
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = parse_cli();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    if let Err(err) = tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(level)
            .finish(),
    ) {
        eprintln!("Failed to set tracing subscriber: {}", err);
        return ExitCode::FAILURE;
    }

    info!("Config: {:?}", cli);
    info!("Starting test");

    let addr = format!("{}:{}", cli.server_addr, cli.server_port);
    let timeout_options = TimeoutOptions {
        read_timeout: Duration::from_millis(cli.read_timeout_ms),
        write_timeout: Duration::from_millis(cli.write_timeout_ms),
        ..Default::default()
    };
    let client = match RemoteClient::connect(&addr, timeout_options).await {
        Ok(client) => client,
        Err(err) => {
            error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    let options = HarnessOptions {
        num_ops: cli.num_ops,
        read_prob: cli.read_prob,
        key_space: cli.key_space,
        sample_period: Duration::from_millis(cli.sample_period_ms),
        output: cli.output.clone(),
        seed: cli.seed,
    };
    let retry_strategy: Arc<dyn RetryStrategy> = if cli.retries == 0 {
        Arc::new(FailFast)
    } else {
        Arc::new(FixedBackoff {
            max_retries: cli.retries,
            delay: Duration::from_millis(cli.retry_backoff_ms),
        })
    };

    let harness = match Harness::new(client, options) {
        Ok(harness) => harness.with_retry(retry_strategy),
        Err(err) => {
            error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    match harness.run().await {
        Ok(summary) => {
            info!(
                "{} samples written to {}",
                summary.samples.len(),
                cli.output.display()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("Run aborted: {}", err);
            ExitCode::FAILURE
        }
    }
}
