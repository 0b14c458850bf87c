use std::net::SocketAddr;

use futures::future::join_all;
use tokio::net::TcpStream;
use tracing::debug;

use super::{
    error::Error,
    wire::{MessageStream, Operation, Request},
};

/// What one client saw: the counter value from its response and the
/// server-measured service latency.
#[derive(Clone, Copy, Debug)]
pub struct ClientReport {
    pub id: u32,
    pub operation: Operation,
    pub counter: i32,
    pub latency_nanos: i64,
}

/// Spawns `count` concurrent clients against `addr`, each opening its own
/// connection and performing exactly one round trip of `operation`. All
/// tasks are joined before this returns; per-client failures are reported
/// in place, not short-circuited.
pub async fn run_clients(
    addr: SocketAddr,
    operation: Operation,
    count: u32,
) -> Vec<Result<ClientReport, Error>> {
    let mut tasks = Vec::with_capacity(count as usize);
    for id in 1..=count {
        tasks.push(tokio::spawn(one_round_trip(addr, operation, id)));
    }
    join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.map_err(Error::from).and_then(|report| report))
        .collect()
}

async fn one_round_trip(
    addr: SocketAddr,
    operation: Operation,
    id: u32,
) -> Result<ClientReport, Error> {
    let conn = TcpStream::connect(addr).await?;
    let mut stream = MessageStream::new(conn);
    stream
        .send_request(&Request {
            operation,
            requester: id,
        })
        .await?;
    let resp = stream
        .recv_response()
        .await?
        .ok_or(Error::ConnectionClosed)?;
    debug!(
        client = id,
        counter = resp.counter,
        latency_nanos = resp.latency_nanos,
        "round trip complete"
    );
    Ok(ClientReport {
        id,
        operation: resp.operation,
        counter: resp.counter,
        latency_nanos: resp.latency_nanos,
    })
}
