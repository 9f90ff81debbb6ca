//! FlakyKvStore - 操作単位で失敗を注入できる KvStore（テスト用）

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::inmem_kv::InMemoryKvStore;
use crate::domain::StoreError;
use crate::ports::KvStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum KvOp {
    Expire,
    Set,
}

/// Delegates to an `InMemoryKvStore`, failing the next N calls of a chosen operation.
#[derive(Default)]
pub(crate) struct FlakyKvStore {
    inner: InMemoryKvStore,
    pending: Mutex<HashMap<KvOp, usize>>,
}

impl FlakyKvStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inner(&self) -> &InMemoryKvStore {
        &self.inner
    }

    pub(crate) fn fail_next(&self, op: KvOp, times: usize) {
        self.pending.lock().unwrap().insert(op, times);
    }

    fn check(&self, op: KvOp) -> Result<(), StoreError> {
        let mut pending = self.pending.lock().unwrap();
        match pending.get_mut(&op) {
            Some(left) if *left > 0 => {
                *left -= 1;
                Err(StoreError::Unavailable)
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl KvStore for FlakyKvStore {
    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        self.inner.incr(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.check(KvOp::Expire)?;
        self.inner.expire(key, ttl).await
    }

    async fn expire_if_unset(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.check(KvOp::Expire)?;
        self.inner.expire_if_unset(key, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.check(KvOp::Set)?;
        self.inner.set(key, value, ttl).await
    }

    async fn push(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        self.inner.push(key, value).await
    }

    async fn blocking_pop(
        &self,
        key: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<String>, StoreError> {
        self.inner.blocking_pop(key, timeout).await
    }

    async fn list_len(&self, key: &str) -> Result<usize, StoreError> {
        self.inner.list_len(key).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }
}
