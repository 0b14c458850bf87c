use std::sync::Mutex;

use tokio::sync::Notify;
use tracing::trace;

/// Which role wins when readers and writers are both waiting. Fixed for the
/// lifetime of the monitor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Priority {
    /// Readers pass while only a writer is *active*; arriving writers also
    /// yield to waiting readers. Can starve writers.
    Reader,
    /// Readers yield to waiting writers as well as active ones. Can starve
    /// readers.
    Writer,
}

#[derive(Default)]
struct LockState {
    readers_active: u32,
    writer_active: bool,
    readers_waiting: u32,
    writers_waiting: u32,
}

impl LockState {
    fn reader_admissible(&self, priority: Priority) -> bool {
        !self.writer_active
            && !(priority == Priority::Writer && self.writers_waiting > 0)
    }

    fn writer_admissible(&self, priority: Priority) -> bool {
        !self.writer_active
            && self.readers_active == 0
            && !(priority == Priority::Reader && self.readers_waiting > 0)
    }
}

/// The readers-writers monitor guarding the shared counter's critical
/// section.
///
/// Invariants: a writer is never active alongside another writer or any
/// reader, and admission between roles follows the configured [`Priority`].
/// All state, including the waiting counts the opposite role's admission
/// predicate reads, lives under a single mutex; waiters register their
/// wakeup before that mutex is dropped, so a release can never slip between
/// the predicate check and the wait.
///
/// A writer's release wakes every blocked reader and one blocked writer; a
/// reader's release wakes one blocked writer once the last reader is out.
/// Woken tasks re-check the predicate in a loop, so stray wakeups are
/// harmless.
pub struct RwMonitor {
    priority: Priority,
    state: Mutex<LockState>,
    readers: Notify,
    writers: Notify,
}

impl RwMonitor {
    pub fn new(priority: Priority) -> Self {
        Self {
            priority,
            state: Mutex::new(LockState::default()),
            readers: Notify::new(),
            writers: Notify::new(),
        }
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Blocks until shared access is admissible, then holds it until
    /// [`release_read`](Self::release_read).
    pub async fn acquire_read(&self) {
        let mut waiting = false;
        loop {
            let notified = self.readers.notified();
            tokio::pin!(notified);
            {
                let mut state = self.state.lock().unwrap();
                if state.reader_admissible(self.priority) {
                    if waiting {
                        state.readers_waiting -= 1;
                    }
                    state.readers_active += 1;
                    trace!(active = state.readers_active, "reader admitted");
                    return;
                }
                if !waiting {
                    state.readers_waiting += 1;
                    waiting = true;
                }
                notified.as_mut().enable();
            }
            notified.await;
        }
    }

    /// Blocks until exclusive access is admissible, then holds it until
    /// [`release_write`](Self::release_write).
    pub async fn acquire_write(&self) {
        let mut waiting = false;
        loop {
            let notified = self.writers.notified();
            tokio::pin!(notified);
            {
                let mut state = self.state.lock().unwrap();
                if state.writer_admissible(self.priority) {
                    if waiting {
                        state.writers_waiting -= 1;
                    }
                    state.writer_active = true;
                    trace!("writer admitted");
                    return;
                }
                if !waiting {
                    state.writers_waiting += 1;
                    waiting = true;
                }
                notified.as_mut().enable();
            }
            notified.await;
        }
    }

    /// Drops shared access. The last reader out signals one waiting writer.
    pub fn release_read(&self) {
        let mut state = self.state.lock().unwrap();
        debug_assert!(state.readers_active > 0);
        state.readers_active -= 1;
        if state.readers_active == 0 {
            self.writers.notify_one();
        }
    }

    /// Drops exclusive access: broadcast to readers, then signal one writer.
    pub fn release_write(&self) {
        let mut state = self.state.lock().unwrap();
        debug_assert!(state.writer_active);
        state.writer_active = false;
        drop(state);
        self.readers.notify_waiters();
        self.writers.notify_one();
    }
}
