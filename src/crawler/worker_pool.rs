//! Bounded-concurrency worker pool
//!
//! A fixed number of workers share one bounded task queue and push the
//! processor's output onto one bounded result queue. Both queues hold
//! `2 * workers` items.

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError, OwnedPermit};
use tokio_util::sync::CancellationToken;

/// Errors returned when submitting to a pool
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool is closed")]
    Closed,

    #[error("worker pool task queue is full")]
    Full,
}

type Processor<T, R> = Arc<dyn Fn(T) -> BoxFuture<'static, R> + Send + Sync>;

/// Runs a caller-supplied async function over submitted tasks
pub struct WorkerPool<T, R> {
    worker_count: usize,
    processor: Processor<T, R>,
    task_tx: Mutex<Option<mpsc::Sender<T>>>,
    task_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<T>>>,
}

impl<T, R> WorkerPool<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    /// Creates a pool of `worker_count` workers (at least 1)
    ///
    /// Nothing runs until [`WorkerPool::start`] is called; tasks submitted
    /// before that wait in the queue.
    pub fn new<F, Fut>(worker_count: usize, processor: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let worker_count = worker_count.max(1);
        let (task_tx, task_rx) = mpsc::channel(worker_count * 2);

        Self {
            worker_count,
            processor: Arc::new(move |task| -> BoxFuture<'static, R> { Box::pin(processor(task)) }),
            task_tx: Mutex::new(Some(task_tx)),
            task_rx: Arc::new(tokio::sync::Mutex::new(task_rx)),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Spawns the workers and returns the result stream
    ///
    /// Workers exit when the task queue is closed and drained, or as soon as
    /// `cancel` fires. Cancellation may drop a task that is mid-flight
    /// without producing a result. The returned receiver yields `None` only
    /// after every worker has exited.
    pub fn start(&self, cancel: CancellationToken) -> mpsc::Receiver<R> {
        let (result_tx, result_rx) = mpsc::channel(self.worker_count * 2);

        for id in 0..self.worker_count {
            tokio::spawn(run_worker(
                id,
                Arc::clone(&self.task_rx),
                result_tx.clone(),
                Arc::clone(&self.processor),
                cancel.clone(),
            ));
        }

        tracing::debug!("Started {} workers", self.worker_count);
        result_rx
    }

    /// Enqueues a task, waiting while the queue is full
    pub async fn submit(&self, task: T) -> Result<(), PoolError> {
        let sender = self.sender()?;
        sender.send(task).await.map_err(|_| PoolError::Closed)
    }

    /// Enqueues a task without waiting
    ///
    /// On failure the task is handed back with the reason.
    pub fn try_submit(&self, task: T) -> Result<(), (T, PoolError)> {
        let sender = match self.sender() {
            Ok(sender) => sender,
            Err(e) => return Err((task, e)),
        };

        sender.try_send(task).map_err(|e| match e {
            TrySendError::Full(task) => (task, PoolError::Full),
            TrySendError::Closed(task) => (task, PoolError::Closed),
        })
    }

    /// Waits for a free queue slot
    ///
    /// The permit guarantees the next `send` through it succeeds without
    /// waiting. Dropping the permit releases the slot.
    pub async fn reserve(&self) -> Result<OwnedPermit<T>, PoolError> {
        let sender = self.sender()?;
        sender.reserve_owned().await.map_err(|_| PoolError::Closed)
    }

    /// Signals that no more tasks will be submitted
    ///
    /// Queued tasks are still processed. Calling it again is a no-op.
    pub fn close(&self) {
        let mut task_tx = self.task_tx.lock().unwrap_or_else(|e| e.into_inner());
        if task_tx.take().is_some() {
            tracing::debug!("Worker pool task queue closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.task_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }

    /// Clones the sender so no lock is held across an await
    fn sender(&self) -> Result<mpsc::Sender<T>, PoolError> {
        self.task_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(PoolError::Closed)
    }
}

async fn run_worker<T, R>(
    id: usize,
    tasks: Arc<tokio::sync::Mutex<mpsc::Receiver<T>>>,
    results: mpsc::Sender<R>,
    processor: Processor<T, R>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Worker {}: cancelled, shutting down", id);
                return;
            }
            task = next_task(&tasks) => task,
        };

        let Some(task) = next else {
            tracing::debug!("Worker {}: task queue closed, shutting down", id);
            return;
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Worker {}: cancelled mid-task, dropping it", id);
                return;
            }
            result = processor(task) => result,
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            sent = results.send(result) => {
                if sent.is_err() {
                    tracing::debug!("Worker {}: result stream dropped, shutting down", id);
                    return;
                }
            }
        }
    }
}

async fn next_task<T>(tasks: &tokio::sync::Mutex<mpsc::Receiver<T>>) -> Option<T> {
    tasks.lock().await.recv().await
}
