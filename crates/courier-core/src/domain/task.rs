use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::CourierError;
use super::ids::TaskId;

/// FIFO に積まれる“運搬用”データ。投入後は不変。
///
/// JSON 表現は `{"taskId", "payload", "createdAt"}`。
/// 古いクライアントが使っていた `message` フィールドも payload として読める。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDescriptor {
    task_id: TaskId,
    #[serde(alias = "message")]
    payload: String,
    created_at: DateTime<Utc>,
}

impl TaskDescriptor {
    pub fn new(task_id: TaskId, payload: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            task_id,
            payload: payload.into(),
            created_at,
        }
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn to_json(&self) -> Result<String, CourierError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, CourierError> {
        Ok(serde_json::from_str(raw)?)
    }
}
