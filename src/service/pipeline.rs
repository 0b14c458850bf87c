use std::{collections::VecDeque, sync::Mutex};

use tokio::sync::Semaphore;

/// Hand-off point between the accept loop and the worker pool.
///
/// Accepted connections are queued FIFO; `slots` caps how many may sit
/// unclaimed (the acceptor blocks in [`submit`](Self::submit) when the cap
/// is reached, rather than overflowing) and `ready` wakes one worker per
/// queued connection. The queue is only ever touched under its mutex.
pub struct Pipeline<T> {
    queue: Mutex<VecDeque<T>>,
    ready: Semaphore,
    slots: Semaphore,
    capacity: usize,
}

impl<T> Pipeline<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            ready: Semaphore::new(0),
            slots: Semaphore::new(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Queues one item, waiting for a free slot when the pipeline is full.
    pub async fn submit(&self, item: T) {
        let permit =
            self.slots.acquire().await.expect("pipeline semaphore closed");
        permit.forget();
        self.queue.lock().unwrap().push_back(item);
        self.ready.add_permits(1);
    }

    /// Waits for a queued item and claims it. Cancel-safe: a cancelled
    /// claim consumes nothing.
    pub async fn claim(&self) -> T {
        let permit =
            self.ready.acquire().await.expect("pipeline semaphore closed");
        permit.forget();
        self.take()
    }

    /// Claims a queued item if one is ready right now.
    pub fn try_claim(&self) -> Option<T> {
        let permit = self.ready.try_acquire().ok()?;
        permit.forget();
        Some(self.take())
    }

    fn take(&self) -> T {
        let item = self
            .queue
            .lock()
            .unwrap()
            .pop_front()
            .expect("ready permit without a queued item");
        self.slots.add_permits(1);
        item
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, time::Duration};
    use tokio::time::timeout;

    #[tokio::test]
    async fn claims_in_submission_order() {
        let pipeline = Pipeline::new(4);
        pipeline.submit(1).await;
        pipeline.submit(2).await;
        pipeline.submit(3).await;
        assert_eq!(pipeline.claim().await, 1);
        assert_eq!(pipeline.claim().await, 2);
        assert_eq!(pipeline.claim().await, 3);
    }

    #[tokio::test]
    async fn try_claim_on_empty_queue() {
        let pipeline: Pipeline<u32> = Pipeline::new(4);
        assert_eq!(pipeline.try_claim(), None);
    }

    #[tokio::test]
    async fn full_pipeline_applies_backpressure() {
        let pipeline = Arc::new(Pipeline::new(2));
        pipeline.submit(1).await;
        pipeline.submit(2).await;

        // a third submission parks instead of overflowing
        assert!(timeout(Duration::from_millis(50), pipeline.submit(3))
            .await
            .is_err());

        // claiming frees a slot and lets the submission through
        assert_eq!(pipeline.claim().await, 1);
        timeout(Duration::from_millis(500), pipeline.submit(3))
            .await
            .expect("slot was free");
        assert_eq!(pipeline.claim().await, 2);
        assert_eq!(pipeline.claim().await, 3);
    }

    #[tokio::test]
    async fn parked_submission_completes_once_claimed() {
        let pipeline = Arc::new(Pipeline::new(1));
        pipeline.submit(1).await;

        let parked = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.submit(2).await })
        };
        assert_eq!(pipeline.claim().await, 1);
        timeout(Duration::from_secs(5), parked)
            .await
            .expect("submission stayed parked")
            .unwrap();
        assert_eq!(pipeline.claim().await, 2);
    }
}
