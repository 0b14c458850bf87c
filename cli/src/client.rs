use std::net::{IpAddr, SocketAddr};

use clap::{Parser, ValueEnum};
use tally::service::{client::run_clients, wire::Operation, DEFAULT_PORT};
use tracing::error;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Reader,
    Writer,
}

impl From<ModeArg> for Operation {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Reader => Operation::Read,
            ModeArg::Writer => Operation::Write,
        }
    }
}

/// Concurrent load generator for the counter server.
#[derive(Parser, Debug)]
#[command(name = "tally-client")]
struct Args {
    /// Server address.
    #[arg(long, default_value = "127.0.0.1")]
    ip: IpAddr,
    /// Server port.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Whether every client reads or increments the counter.
    #[arg(long, value_enum)]
    mode: ModeArg,
    /// Number of concurrent clients to launch.
    #[arg(long, default_value_t = 1)]
    threads: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let addr = SocketAddr::new(args.ip, args.port);
    let reports = run_clients(addr, args.mode.into(), args.threads).await;

    let mut failures = 0u32;
    for report in reports {
        match report {
            Ok(report) => println!(
                "[client #{}] {}, counter={}, latency={} ns",
                report.id,
                report.operation.as_str(),
                report.counter,
                report.latency_nanos
            ),
            Err(e) => {
                failures += 1;
                error!("client failed: {e}");
            }
        }
    }
    if failures > 0 {
        return Err(format!("{failures} client(s) failed").into());
    }
    Ok(())
}
