use std::{
    future::Future,
    net::{Ipv4Addr, SocketAddr},
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use rand::Rng;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::watch,
    time::sleep,
};
use tracing::{debug, error, info, warn};
use typed_builder::TypedBuilder;

use super::{
    counter::CounterStore,
    error::Error,
    monitor::{Priority, RwMonitor},
    pipeline::Pipeline,
    wire::{MessageStream, Operation, Response},
};

#[derive(Clone, Debug, TypedBuilder)]
pub struct ServerConfig {
    pub priority: Priority,
    #[builder(default = super::DEFAULT_PORT)]
    pub port: u16,
    #[builder(default = super::DEFAULT_POOL_SIZE)]
    pub workers: usize,
    #[builder(default = PathBuf::from(super::DEFAULT_COUNTER_PATH))]
    pub counter_path: PathBuf,
    /// Bounds (microseconds) of the random delay injected inside the
    /// critical section. `(0, 0)` disables it.
    #[builder(default = super::DEFAULT_DELAY_MICROS)]
    pub delay_micros: (u64, u64),
}

/// The counter server: one accept loop feeding a fixed pool of long-lived
/// workers through a bounded [`Pipeline`], every request serialized by the
/// [`RwMonitor`].
pub struct Server {
    config: ServerConfig,
    listener: TcpListener,
    monitor: Arc<RwMonitor>,
    store: Arc<CounterStore>,
    pipeline: Arc<Pipeline<TcpStream>>,
}

impl Server {
    /// Seeds the counter store and binds the listening socket. Bind/listen
    /// failure is fatal and aborts startup.
    pub async fn bind(config: ServerConfig) -> Result<Self, Error> {
        let store = CounterStore::new(&config.counter_path);
        store.ensure_exists().await?;

        let listener =
            TcpListener::bind((Ipv4Addr::UNSPECIFIED, config.port)).await?;
        info!(
            addr = %listener.local_addr()?,
            priority = ?config.priority,
            workers = config.workers,
            "listening"
        );

        let monitor = Arc::new(RwMonitor::new(config.priority));
        let pipeline = Arc::new(Pipeline::new(config.workers));
        Ok(Self {
            config,
            listener,
            monitor,
            store: Arc::new(store),
            pipeline,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until `shutdown` resolves, then drains: the
    /// accept loop stops, every in-flight critical section finishes,
    /// already-queued connections are still served, and all workers are
    /// joined before this returns.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<(), Error> {
        let (closing_tx, closing_rx) = watch::channel(false);

        let mut workers = Vec::with_capacity(self.config.workers);
        for worker in 0..self.config.workers {
            workers.push(tokio::spawn(worker_loop(
                worker,
                self.pipeline.clone(),
                self.monitor.clone(),
                self.store.clone(),
                self.config.delay_micros,
                closing_rx.clone(),
            )));
        }
        drop(closing_rx);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested, draining workers");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((conn, peer)) => {
                        debug!(%peer, "accepted connection");
                        self.pipeline.submit(conn).await;
                    }
                    // accept failures never terminate the loop
                    Err(e) => warn!("accept failed: {e}"),
                },
            }
        }

        drop(self.listener);
        let _ = closing_tx.send(true);
        for worker in workers {
            let _ = worker.await;
        }
        info!("all workers stopped");
        Ok(())
    }
}

/// One long-lived worker: claim a connection, serve exactly one request,
/// close, repeat. A connection's failure never touches the pool or the
/// monitor.
async fn worker_loop(
    worker: usize,
    pipeline: Arc<Pipeline<TcpStream>>,
    monitor: Arc<RwMonitor>,
    store: Arc<CounterStore>,
    delay_micros: (u64, u64),
    mut closing: watch::Receiver<bool>,
) {
    loop {
        let conn = tokio::select! {
            conn = pipeline.claim() => conn,
            _ = closing.changed() => break,
        };
        if let Err(e) = serve_connection(conn, &monitor, &store, delay_micros).await {
            warn!(worker, "connection failed: {e}");
        }
    }
    // connections queued before the acceptor stopped still get answered
    while let Some(conn) = pipeline.try_claim() {
        if let Err(e) = serve_connection(conn, &monitor, &store, delay_micros).await {
            warn!(worker, "connection failed: {e}");
        }
    }
}

async fn serve_connection(
    conn: TcpStream,
    monitor: &RwMonitor,
    store: &CounterStore,
    delay_micros: (u64, u64),
) -> Result<(), Error> {
    let mut stream = MessageStream::new(conn);
    let req = match stream.recv_request().await? {
        Some(req) => req,
        // connect-and-leave, nothing to answer
        None => return Ok(()),
    };
    let received_at = Instant::now();

    let outcome = match req.operation {
        Operation::Read => {
            monitor.acquire_read().await;
            let outcome = store.read().await;
            service_delay(delay_micros).await;
            monitor.release_read();
            outcome
        }
        Operation::Write => {
            monitor.acquire_write().await;
            let outcome = store.increment().await;
            service_delay(delay_micros).await;
            monitor.release_write();
            outcome
        }
    };

    let counter = match outcome {
        Ok(value) => {
            match req.operation {
                Operation::Read => {
                    info!(reader = req.requester, value, "read counter")
                }
                Operation::Write => {
                    info!(writer = req.requester, value, "incremented counter")
                }
            }
            value
        }
        Err(e) => {
            error!(requester = req.requester, "counter operation failed: {e}");
            -1
        }
    };

    let resp = Response {
        operation: req.operation,
        counter,
        latency_nanos: received_at.elapsed().as_nanos() as i64,
    };
    stream.send_response(&resp).await
}

/// Synthetic service time, spent while still holding the monitor, so that
/// contention is actually observable.
async fn service_delay((lo, hi): (u64, u64)) {
    if hi == 0 {
        return;
    }
    let micros = rand::thread_rng().gen_range(lo..=hi);
    sleep(Duration::from_micros(micros)).await;
}
