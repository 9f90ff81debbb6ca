//! TaskQueue - タスク投入（producer 側）
//!
//! # フロー
//! 1. payload を検証（空なら ValidationError、副作用なし）
//! 2. taskId を採番して descriptor を FIFO の末尾に push
//! 3. status を `queued` で書く
//!
//! 2 と 3 は別々の書き込みでトランザクションではない。
//! 3 が失敗しても descriptor は積まれたままなので、タスクは実行される。
//! その間の poll は not found になり、完了時に `completed` が書かれる。
//! 呼び出し元にはエラーを返す（部分失敗を隠さない）。

use std::sync::Arc;

use tracing::{info, warn};

use super::status::StatusStore;
use crate::domain::{CourierError, TaskDescriptor, TaskId, TaskState};
use crate::ports::{Clock, IdGenerator, KvStore};

pub struct TaskQueue {
    kv: Arc<dyn KvStore>,
    statuses: StatusStore,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    queue_key: String,
}

impl TaskQueue {
    pub fn new(
        kv: Arc<dyn KvStore>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        queue_key: impl Into<String>,
    ) -> Self {
        Self {
            statuses: StatusStore::new(kv.clone()),
            kv,
            ids,
            clock,
            queue_key: queue_key.into(),
        }
    }

    pub fn queue_key(&self) -> &str {
        &self.queue_key
    }

    pub async fn enqueue(&self, payload: &str) -> Result<TaskId, CourierError> {
        if payload.trim().is_empty() {
            return Err(CourierError::Validation("payload must not be empty".into()));
        }

        let task_id = self.ids.next_task_id();
        let descriptor = TaskDescriptor::new(task_id.clone(), payload, self.clock.now());
        self.kv.push(&self.queue_key, &descriptor.to_json()?).await?;

        if let Err(err) = self.statuses.set(&task_id, TaskState::Queued).await {
            warn!(task_id = %task_id, error = %err, "descriptor queued but status write failed");
            return Err(err);
        }

        info!(task_id = %task_id, queue = %self.queue_key, "task queued");
        Ok(task_id)
    }

    /// Number of descriptors waiting for a worker.
    pub async fn depth(&self) -> Result<usize, CourierError> {
        Ok(self.kv.list_len(&self.queue_key).await?)
    }
}
