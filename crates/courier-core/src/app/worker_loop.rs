//! WorkerLoop - タスク実行ループ
//!
//! # 1 イテレーションの状態
//! Idle → Blocked-on-dequeue → Executing → Idle
//!
//! # フロー
//! 1. `KvStore::blocking_pop()` で descriptor を 1 件取る（タイムアウトなし）
//! 2. descriptor を deserialize（壊れていたらログを出して捨てる）
//! 3. `TaskExecutor` で実行
//! 4. status を `completed` に上書き
//!
//! lease も ack もない。pop した時点で配送は確定し、実行中にプロセスが
//! 落ちればそのタスクは失われる（at-most-once）。
//! 実行失敗はリトライせず、status は `queued` のまま残る。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{error, info, warn};

use super::status::StatusStore;
use crate::domain::{CourierError, TaskDescriptor, TaskId, TaskState};
use crate::ports::KvStore;

/// Pause before dequeuing again after the store refused a pop.
const STORE_ERROR_PAUSE: Duration = Duration::from_secs(1);

/// The work performed for one descriptor.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, descriptor: &TaskDescriptor) -> Result<(), CourierError>;
}

/// Stand-in workload: sleeps for a fixed duration and succeeds.
#[derive(Debug, Clone)]
pub struct SimulatedWork {
    duration: Duration,
}

impl SimulatedWork {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl TaskExecutor for SimulatedWork {
    async fn execute(&self, descriptor: &TaskDescriptor) -> Result<(), CourierError> {
        info!(
            task_id = %descriptor.task_id(),
            payload = descriptor.payload(),
            "processing task"
        );
        tokio::time::sleep(self.duration).await;
        Ok(())
    }
}

/// What happened to the descriptor taken in one iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Iteration {
    /// Executed and marked `completed`.
    Completed(TaskId),
    /// The executor failed; the status stays `queued`.
    Abandoned(TaskId),
    /// The descriptor could not be decoded and was discarded.
    Dropped,
}

pub struct WorkerLoop {
    worker_id: usize,
    kv: Arc<dyn KvStore>,
    statuses: StatusStore,
    executor: Arc<dyn TaskExecutor>,
    queue_key: String,
}

impl WorkerLoop {
    pub fn new(
        worker_id: usize,
        kv: Arc<dyn KvStore>,
        executor: Arc<dyn TaskExecutor>,
        queue_key: impl Into<String>,
    ) -> Self {
        Self {
            worker_id,
            statuses: StatusStore::new(kv.clone()),
            kv,
            executor,
            queue_key: queue_key.into(),
        }
    }

    /// Block until one descriptor is available, then process it.
    pub async fn run_once(&self) -> Result<Iteration, CourierError> {
        let raw = loop {
            if let Some(raw) = self.kv.blocking_pop(&self.queue_key, None).await? {
                break raw;
            }
        };
        self.process(&raw).await
    }

    /// Consume until `shutdown` flips to `true` (or its sender is dropped).
    ///
    /// Shutdown is only observed while waiting for a descriptor; an
    /// in-flight task runs to the end first.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            worker_id = self.worker_id,
            queue = %self.queue_key,
            "worker started, waiting for tasks"
        );
        loop {
            if *shutdown.borrow() {
                break;
            }

            let popped = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                popped = self.kv.blocking_pop(&self.queue_key, None) => popped,
            };

            let raw = match popped {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(err) => {
                    error!(worker_id = self.worker_id, error = %err, "dequeue failed");
                    tokio::time::sleep(STORE_ERROR_PAUSE).await;
                    continue;
                }
            };

            if let Err(err) = self.process(&raw).await {
                error!(
                    worker_id = self.worker_id,
                    error = %err,
                    "could not record task completion"
                );
            }
        }
        info!(worker_id = self.worker_id, "worker stopped");
    }

    async fn process(&self, raw: &str) -> Result<Iteration, CourierError> {
        let descriptor = match TaskDescriptor::from_json(raw) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                warn!(worker_id = self.worker_id, error = %err, "dropping malformed descriptor");
                return Ok(Iteration::Dropped);
            }
        };
        let task_id = descriptor.task_id().clone();

        if let Err(err) = self.executor.execute(&descriptor).await {
            error!(
                worker_id = self.worker_id,
                task_id = %task_id,
                error = %err,
                "task failed, abandoning it"
            );
            return Ok(Iteration::Abandoned(task_id));
        }

        self.statuses.set(&task_id, TaskState::Completed).await?;
        info!(worker_id = self.worker_id, task_id = %task_id, "task completed");
        Ok(Iteration::Completed(task_id))
    }
}
