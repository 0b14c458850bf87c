use std::{fmt, io, num::ParseIntError};

use tokio::task::JoinError;

#[derive(Debug)]
pub enum Error {
    /// Transport failure on a single connection.
    Io(io::Error),
    /// A request carried an operation discriminant we don't know.
    UnknownOperation(i32),
    /// The counter's backing file could not be opened, read or rewritten.
    Store(io::Error),
    /// The backing file held something that isn't an integer.
    CounterParse(ParseIntError),
    /// The peer closed the connection before a full message arrived.
    ConnectionClosed,
    /// A client task panicked or was cancelled before reporting.
    Task(JoinError),
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ParseIntError> for Error {
    fn from(e: ParseIntError) -> Self {
        Self::CounterParse(e)
    }
}

impl From<JoinError> for Error {
    fn from(e: JoinError) -> Self {
        Self::Task(e)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "transport error: {e}"),
            Self::UnknownOperation(op) => {
                write!(f, "unknown operation discriminant {op}")
            }
            Self::Store(e) => write!(f, "counter store error: {e}"),
            Self::CounterParse(e) => {
                write!(f, "counter file is not an integer: {e}")
            }
            Self::ConnectionClosed => {
                write!(f, "peer closed the connection mid-message")
            }
            Self::Task(e) => write!(f, "client task failed: {e}"),
        }
    }
}

impl std::error::Error for Error {}
