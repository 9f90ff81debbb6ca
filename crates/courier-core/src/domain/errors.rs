//! Errors - エラー型と分類
//!
//! - `StoreError`: ports（KvStore / EntityStore）が返すインフラ層のエラー
//! - `CourierError`: アプリケーション層のエラー。`kind()` で運用分類を引ける

use thiserror::Error;

/// ErrorKind は呼び出し側（HTTP 層など）がレスポンスを決めるための分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 入力不正。副作用なし
    Validation,
    /// 未知の ID。システム障害ではない
    NotFound,
    /// リクエスト予算の超過
    RateLimited,
    /// KV / primary store の障害
    Infrastructure,
    /// ワーカー側のタスク実行失敗
    Execution,
}

/// Failure reported by a backing store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store is unreachable")]
    Unavailable,

    #[error("key `{0}` holds a value of the wrong type")]
    WrongType(String),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum CourierError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("too many requests from client={0}")]
    RateLimited(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("task execution failed: {0}")]
    TaskExecution(String),

    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CourierError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CourierError::Validation(_) | CourierError::Config(_) => ErrorKind::Validation,
            CourierError::NotFound(_) => ErrorKind::NotFound,
            CourierError::RateLimited(_) => ErrorKind::RateLimited,
            CourierError::StoreUnavailable(_) | CourierError::Malformed(_) => {
                ErrorKind::Infrastructure
            }
            CourierError::TaskExecution(_) => ErrorKind::Execution,
        }
    }
}

impl From<serde_json::Error> for CourierError {
    fn from(err: serde_json::Error) -> Self {
        CourierError::Malformed(err.to_string())
    }
}
