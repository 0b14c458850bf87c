pub mod client;
pub mod counter;
pub mod error;
pub mod monitor;
pub mod pipeline;
pub mod server;
pub mod wire;

/// Default port the server listens on.
pub const DEFAULT_PORT: u16 = 8073;

/// Size of the long-lived worker pool.
pub const DEFAULT_POOL_SIZE: usize = 600;

/// Backing file for the shared counter.
pub const DEFAULT_COUNTER_PATH: &str = "server_output.txt";

/// Bounds (microseconds) of the synthetic service delay injected inside the
/// critical section to make contention observable.
pub const DEFAULT_DELAY_MICROS: (u64, u64) = (75_000, 150_000);
