//! StatusStore - `taskId -> state` の記録
//!
//! - producer が `queued` を、ワーカーが `completed` を書く
//! - 書き込みは無条件上書き（last-writer-wins）。taskId ごとに書き手は 1 つだけ
//! - TTL なし。レコードは消えずに溜まり続ける

use std::sync::Arc;

use crate::domain::{CourierError, TaskId, TaskState};
use crate::ports::KvStore;

const STATUS_KEY_PREFIX: &str = "task_status:";

pub fn status_key(task_id: &TaskId) -> String {
    format!("{STATUS_KEY_PREFIX}{task_id}")
}

#[derive(Clone)]
pub struct StatusStore {
    kv: Arc<dyn KvStore>,
}

impl StatusStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// `Ok(None)` for ids that were never recorded.
    pub async fn get(&self, task_id: &TaskId) -> Result<Option<TaskState>, CourierError> {
        let raw = self.kv.get(&status_key(task_id)).await?;
        raw.map(|raw| raw.parse::<TaskState>()).transpose()
    }

    pub async fn set(&self, task_id: &TaskId, state: TaskState) -> Result<(), CourierError> {
        self.kv
            .set(&status_key(task_id), state.as_str(), None)
            .await?;
        Ok(())
    }
}
