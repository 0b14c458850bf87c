use std::{net::SocketAddr, path::PathBuf, time::Duration};

use tally::service::{
    client::run_clients,
    error::Error,
    monitor::Priority,
    server::{Server, ServerConfig},
    wire::Operation,
};
use tokio::{sync::oneshot, task::JoinHandle, time::sleep};

struct Harness {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    server: JoinHandle<Result<(), Error>>,
    counter_path: PathBuf,
}

async fn start(priority: Priority, name: &str, delay_micros: (u64, u64)) -> Harness {
    let _ = tracing_subscriber::fmt::try_init();

    let mut counter_path = std::env::temp_dir();
    counter_path.push(format!("tally-it-{name}-{}", std::process::id()));
    let _ = std::fs::remove_file(&counter_path);

    let config = ServerConfig::builder()
        .priority(priority)
        .port(0)
        .workers(32)
        .counter_path(counter_path.clone())
        .delay_micros(delay_micros)
        .build();
    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();

    let (shutdown, rx) = oneshot::channel();
    let server = tokio::spawn(server.run(async {
        let _ = rx.await;
    }));
    Harness {
        addr,
        shutdown,
        server,
        counter_path,
    }
}

impl Harness {
    fn stored_counter(&self) -> i32 {
        std::fs::read_to_string(&self.counter_path)
            .unwrap()
            .trim()
            .parse()
            .unwrap()
    }

    async fn stop(self) {
        let _ = self.shutdown.send(());
        self.server.await.unwrap().unwrap();
    }
}

// 10 writers and 10 readers racing under reader priority: the counter ends
// at exactly 10 and every reader sees a value the writers actually stored.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_readers_and_writers_reader_priority() {
    let harness = start(Priority::Reader, "scenario-a", (500, 1_000)).await;

    let (writers, readers) = tokio::join!(
        run_clients(harness.addr, Operation::Write, 10),
        run_clients(harness.addr, Operation::Read, 10),
    );

    let mut written: Vec<i32> = writers
        .into_iter()
        .map(|r| r.unwrap().counter)
        .collect();
    written.sort_unstable();
    assert_eq!(written, (1..=10).collect::<Vec<i32>>());

    for report in readers {
        let report = report.unwrap();
        assert!(
            (0..=10).contains(&report.counter),
            "reader saw impossible value {}",
            report.counter
        );
        assert!(report.latency_nanos > 0);
    }

    assert_eq!(harness.stored_counter(), 10);
    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_writer_priority() {
    let harness = start(Priority::Writer, "writers", (0, 0)).await;

    let reports = run_clients(harness.addr, Operation::Write, 25).await;
    for report in reports {
        report.unwrap();
    }
    assert_eq!(harness.stored_counter(), 25);
    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn responses_echo_the_requested_operation() {
    let harness = start(Priority::Writer, "echo-op", (0, 0)).await;

    let reports = run_clients(harness.addr, Operation::Read, 3).await;
    for report in reports {
        let report = report.unwrap();
        assert_eq!(report.operation, Operation::Read);
        assert_eq!(report.counter, 0);
    }
    harness.stop().await;
}

// A broken backing file answers with counter = -1 but still releases the
// monitor: once the file is repaired, later requests go straight through.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn store_failure_answers_minus_one_without_leaking_the_lock() {
    let harness = start(Priority::Writer, "bad-store", (0, 0)).await;

    std::fs::write(&harness.counter_path, "not a number\n").unwrap();

    let reads = run_clients(harness.addr, Operation::Read, 2).await;
    for report in reads {
        assert_eq!(report.unwrap().counter, -1);
    }
    let writes = run_clients(harness.addr, Operation::Write, 2).await;
    for report in writes {
        assert_eq!(report.unwrap().counter, -1);
    }

    // repair the file; if a failed request had leaked the monitor, these
    // would hang instead of being admitted
    std::fs::write(&harness.counter_path, "5\n").unwrap();

    let read = run_clients(harness.addr, Operation::Read, 1).await;
    assert_eq!(read[0].as_ref().unwrap().counter, 5);
    let write = run_clients(harness.addr, Operation::Write, 1).await;
    assert_eq!(write[0].as_ref().unwrap().counter, 6);

    assert_eq!(harness.stored_counter(), 6);
    harness.stop().await;
}

// Shutdown arrives while requests are still in flight: every accepted
// request still gets a complete response and no increment is lost.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_drains_in_flight_requests() {
    let harness = start(Priority::Writer, "scenario-c", (5_000, 10_000)).await;

    let load = tokio::spawn(run_clients(harness.addr, Operation::Write, 20));

    // let every client connect and be queued, then pull the plug mid-flight
    sleep(Duration::from_millis(50)).await;
    let _ = harness.shutdown.send(());
    harness.server.await.unwrap().unwrap();

    let reports = load.await.unwrap();
    for report in reports {
        report.unwrap();
    }
    let stored: i32 = std::fs::read_to_string(&harness.counter_path)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert_eq!(stored, 20);
}
