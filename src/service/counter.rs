use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use super::error::Error;

/// The one piece of durable state: a single non-negative integer stored as
/// text in a file, rewritten in place on every increment. Last write wins;
/// no handle is kept open between operations.
///
/// The store must only be touched from inside an acquired critical section.
pub struct CounterStore {
    path: PathBuf,
}

impl CounterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Seeds the backing file with `0` if it doesn't exist yet.
    pub async fn ensure_exists(&self) -> Result<(), Error> {
        if fs::try_exists(&self.path).await.map_err(Error::Store)? {
            return Ok(());
        }
        debug!(path = %self.path.display(), "seeding counter file");
        fs::write(&self.path, "0\n").await.map_err(Error::Store)
    }

    /// Reads the current counter value.
    pub async fn read(&self) -> Result<i32, Error> {
        let text = fs::read_to_string(&self.path)
            .await
            .map_err(Error::Store)?;
        Ok(text.trim().parse()?)
    }

    /// Reads, increments and rewrites the counter, returning the new value.
    pub async fn increment(&self) -> Result<i32, Error> {
        let value = self.read().await? + 1;
        fs::write(&self.path, format!("{value}\n"))
            .await
            .map_err(Error::Store)?;
        Ok(value)
    }
}
