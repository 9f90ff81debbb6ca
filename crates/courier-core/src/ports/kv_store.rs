//! KvStore port - 共有 KV ストア（Redis 相当）
//!
//! rate limiter, cache, task queue, status store がすべてこの 1 つのストアを共有する。
//! 複数キーにまたがるトランザクションは提供しない。

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::StoreError;

/// KvStore は原子的なプリミティブだけを公開する
///
/// # 必要な操作
/// - `incr`: 原子的インクリメント（キーが無ければ 0 から）
/// - `expire` / `expire_if_unset`: キーに TTL を設定
/// - `get` / `set`: 文字列値（TTL 任意）
/// - `push` / `blocking_pop`: FIFO リスト（末尾 push、先頭 pop）
///
/// `blocking_pop` で取り出した要素は 1 つの呼び出し元にしか渡らない。
/// これがワーカー間の配送排他の唯一の仕組み。
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Atomically increment the integer at `key` and return the new value.
    async fn incr(&self, key: &str) -> Result<i64, StoreError>;

    /// Set a time-to-live on `key`. Returns `false` if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Set a time-to-live on `key` only if it has none (`EXPIRE .. NX`).
    /// Returns `true` if a TTL was applied.
    async fn expire_if_unset(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Overwrite `key`. `ttl = None` means the key never expires.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Append to the tail of the list at `key`; returns the new length.
    async fn push(&self, key: &str, value: &str) -> Result<usize, StoreError>;

    /// Remove the head of the list at `key`, waiting until one is available.
    ///
    /// `timeout = None` waits indefinitely. `Ok(None)` only on timeout.
    /// Cancel-safe: dropping the future before it resolves removes nothing.
    async fn blocking_pop(
        &self,
        key: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<String>, StoreError>;

    async fn list_len(&self, key: &str) -> Result<usize, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
