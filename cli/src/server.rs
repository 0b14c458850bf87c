use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tally::service::{
    monitor::Priority,
    server::{Server, ServerConfig},
    DEFAULT_COUNTER_PATH, DEFAULT_POOL_SIZE, DEFAULT_PORT,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PriorityArg {
    Reader,
    Writer,
}

impl From<PriorityArg> for Priority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Reader => Priority::Reader,
            PriorityArg::Writer => Priority::Writer,
        }
    }
}

/// Priority-configurable readers-writers counter server.
#[derive(Parser, Debug)]
#[command(name = "tally-server")]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Which role wins admission when both are waiting.
    #[arg(long, value_enum)]
    priority: PriorityArg,
    /// Size of the worker pool.
    #[arg(long, default_value_t = DEFAULT_POOL_SIZE)]
    workers: usize,
    /// Backing file for the shared counter.
    #[arg(long, default_value = DEFAULT_COUNTER_PATH)]
    counter_file: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = ServerConfig::builder()
        .priority(args.priority.into())
        .port(args.port)
        .workers(args.workers)
        .counter_path(args.counter_file)
        .build();

    let server = Server::bind(config).await?;
    server
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
