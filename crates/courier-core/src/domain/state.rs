//! State - タスクの状態
//!
//! 状態遷移は一方向のみ:
//! - queued: 投入済み（descriptor push 直後に書かれる）
//! - completed: ワーカーが実行を終えた
//!
//! 実行失敗を表す状態は持たない。失敗したタスクは queued のまま残る
//! （「失敗」と「永遠に待ち」は区別できない）。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::CourierError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Queued,
    Completed,
}

impl TaskState {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Queued => "queued",
            TaskState::Completed => "completed",
        }
    }

    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskState {
    type Err = CourierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(TaskState::Queued),
            "completed" => Ok(TaskState::Completed),
            other => Err(CourierError::Malformed(format!("unknown task state `{other}`"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::queued("queued", TaskState::Queued)]
    #[case::completed("completed", TaskState::Completed)]
    fn parses_stored_values(#[case] raw: &str, #[case] expected: TaskState) {
        let parsed: TaskState = raw.parse().unwrap();
        assert_eq!(parsed, expected);
        assert_eq!(parsed.as_str(), raw);
    }

    #[test]
    fn rejects_unknown_values() {
        assert!("processing".parse::<TaskState>().is_err());
    }

    #[test]
    fn only_completed_is_terminal() {
        assert!(!TaskState::Queued.is_terminal());
        assert!(TaskState::Completed.is_terminal());
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&TaskState::Completed).unwrap(), "\"completed\"");
    }
}
