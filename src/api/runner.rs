//! Background task execution.
//!
//! Submitted tasks go into a bounded channel drained by a fixed pool of
//! workers. A full channel is reported to the caller instead of growing
//! without limit. Shutdown stops workers between tasks; a task already
//! running is finished first.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::agent::Agent;
use crate::task::SharedTask;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Task queue is full")]
    Full,

    #[error("Task queue is shut down")]
    Closed,
}

/// Handle to the worker pool.
pub struct TaskQueue {
    sender: mpsc::Sender<SharedTask>,
    cancel: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskQueue {
    /// Spawn `worker_count` workers sharing one queue of `capacity` slots.
    pub fn start(agent: Arc<Agent>, worker_count: usize, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let cancel = CancellationToken::new();

        let workers = (0..worker_count.max(1))
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    Arc::clone(&agent),
                    Arc::clone(&receiver),
                    cancel.clone(),
                ))
            })
            .collect();

        tracing::info!(
            "Started {} task worker(s), queue capacity {}",
            worker_count.max(1),
            capacity.max(1)
        );

        Self {
            sender,
            cancel,
            workers: Mutex::new(workers),
        }
    }

    /// Hand a task to the workers without waiting for a free slot.
    pub fn submit(&self, task: SharedTask) -> Result<(), QueueError> {
        self.sender.try_send(task).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }

    /// Stop accepting work and wait for every worker to exit.
    ///
    /// Tasks still queued stay `pending`.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handles = std::mem::take(&mut *self.workers.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Task worker panicked: {}", e);
            }
        }
        tracing::info!("Task workers stopped");
    }
}

async fn worker_loop(
    worker_id: usize,
    agent: Arc<Agent>,
    receiver: Arc<Mutex<mpsc::Receiver<SharedTask>>>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            task = async { receiver.lock().await.recv().await } => task,
        };
        let Some(task) = next else {
            break;
        };

        let task_id = task.read().await.id().to_string();
        tracing::debug!("Worker {} picked up task {}", worker_id, task_id);
        let status = agent.execute_task(&task).await;
        if status.is_terminal() {
            tracing::debug!("Worker {} finished task {} as {:?}", worker_id, task_id, status);
        } else {
            tracing::warn!("Worker {} left task {} in {:?}", worker_id, task_id, status);
        }
    }
}
