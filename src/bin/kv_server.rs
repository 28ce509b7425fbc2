use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use kv_loadgen::{common::TimeoutOptions, server::KvServer, store::MemoryStore};
use tracing::{error, info, Level};

/// In-memory key-value server speaking the load generator's protocol.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:6380")]
    addr: String,

    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    if let Err(err) = tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(level)
            .finish(),
    ) {
        eprintln!("Failed to set tracing subscriber: {}", err);
        return ExitCode::FAILURE;
    }

    let store = Arc::new(MemoryStore::new());
    let mut server = KvServer::new(store.clone(), TimeoutOptions::default());
    if let Err(err) = server.listen(&cli.addr).await {
        error!("{}", err);
        return ExitCode::FAILURE;
    }

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to wait for ctrl-c: {}", err);
    }
    server.stop().await;
    info!("Stopped with {} keys stored", store.len().await);
    ExitCode::SUCCESS
}
