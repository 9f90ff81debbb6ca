//! InMemoryKvStore - 開発・テスト用の共有 KV ストア
//!
//! # 実装詳細
//! - `tokio::sync::Mutex` で全キーを 1 つのマップとして排他
//! - `Notify` で push 時に blocking pop の待ち手を起こす
//! - TTL は読み出し時に判定して消す（lazy expiry）
//! - 時刻は `tokio::time::Instant` なので、テストでは `tokio::time::pause()` で進められる
//! - `set_available(false)` で「ストアに届かない」状態を再現できる

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::domain::StoreError;
use crate::ports::KvStore;

enum Value {
    Str(String),
    List(VecDeque<String>),
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn string(value: String, expires_at: Option<Instant>) -> Self {
        Self {
            value: Value::Str(value),
            expires_at,
        }
    }

    fn list() -> Self {
        Self {
            value: Value::List(VecDeque::new()),
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

fn expiry_at(now: Instant, ttl: Duration) -> Result<Instant, StoreError> {
    now.checked_add(ttl)
        .ok_or_else(|| StoreError::Other(format!("ttl of {ttl:?} is out of range")))
}

#[derive(Default)]
struct KvState {
    entries: HashMap<String, Entry>,
}

impl KvState {
    fn prune(&mut self, key: &str, now: Instant) {
        if self.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            self.entries.remove(key);
        }
    }

    fn live(&mut self, key: &str, now: Instant) -> Option<&mut Entry> {
        self.prune(key, now);
        self.entries.get_mut(key)
    }

    fn pop_front(&mut self, key: &str, now: Instant) -> Result<Option<String>, StoreError> {
        let Some(entry) = self.live(key, now) else {
            return Ok(None);
        };
        let Value::List(list) = &mut entry.value else {
            return Err(StoreError::WrongType(key.to_string()));
        };
        let item = list.pop_front();
        // empty lists disappear, same as Redis
        if list.is_empty() {
            self.entries.remove(key);
        }
        Ok(item)
    }
}

pub struct InMemoryKvStore {
    state: Mutex<KvState>,
    notify: Notify,
    available: AtomicBool,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(KvState::default()),
            notify: Notify::new(),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate losing (or regaining) the connection to the store.
    ///
    /// Blocked pops are woken so they observe the change.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Remaining time-to-live of `key`, if it exists and has one.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let expires_at = state.live(key, now)?.expires_at?;
        Some(expires_at.saturating_duration_since(now))
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable)
        }
    }
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn incr(&self, key: &str) -> Result<i64, StoreError> {
        self.ensure_available()?;
        let now = Instant::now();
        let mut state = self.state.lock().await;

        let current = match state.live(key, now) {
            None => 0,
            Some(Entry {
                value: Value::Str(raw),
                ..
            }) => raw
                .parse::<i64>()
                .map_err(|_| StoreError::WrongType(key.to_string()))?,
            Some(_) => return Err(StoreError::WrongType(key.to_string())),
        };
        let next = current
            .checked_add(1)
            .ok_or_else(|| StoreError::Other(format!("increment overflow on `{key}`")))?;

        // INCR keeps an existing TTL
        match state.entries.get_mut(key) {
            Some(entry) => entry.value = Value::Str(next.to_string()),
            None => {
                state
                    .entries
                    .insert(key.to_string(), Entry::string(next.to_string(), None));
            }
        }
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.ensure_available()?;
        let now = Instant::now();
        let mut state = self.state.lock().await;
        match state.live(key, now) {
            Some(entry) => {
                entry.expires_at = Some(expiry_at(now, ttl)?);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn expire_if_unset(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.ensure_available()?;
        let now = Instant::now();
        let mut state = self.state.lock().await;
        match state.live(key, now) {
            Some(entry) if entry.expires_at.is_none() => {
                entry.expires_at = Some(expiry_at(now, ttl)?);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.ensure_available()?;
        let now = Instant::now();
        let mut state = self.state.lock().await;
        match state.live(key, now) {
            None => Ok(None),
            Some(Entry {
                value: Value::Str(raw),
                ..
            }) => Ok(Some(raw.clone())),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.ensure_available()?;
        let expires_at = ttl.map(|ttl| expiry_at(Instant::now(), ttl)).transpose()?;
        let mut state = self.state.lock().await;
        state
            .entries
            .insert(key.to_string(), Entry::string(value.to_string(), expires_at));
        Ok(())
    }

    async fn push(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        self.ensure_available()?;
        let len = {
            let mut state = self.state.lock().await;
            state.prune(key, Instant::now());
            let entry = state.entries.entry(key.to_string()).or_insert_with(Entry::list);
            match &mut entry.value {
                Value::List(list) => {
                    list.push_back(value.to_string());
                    list.len()
                }
                Value::Str(_) => return Err(StoreError::WrongType(key.to_string())),
            }
        };

        // 待ち手は全員起きて再チェックする。取り出せるのはロックを取った 1 人だけ
        self.notify.notify_waiters();
        Ok(len)
    }

    async fn blocking_pop(
        &self,
        key: &str,
        timeout: Option<Duration>,
    ) -> Result<Option<String>, StoreError> {
        // a timeout too large to represent waits forever
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        loop {
            // register interest before checking, so a push between the check
            // and the await is not missed
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            self.ensure_available()?;
            {
                let mut state = self.state.lock().await;
                if let Some(item) = state.pop_front(key, Instant::now())? {
                    return Ok(Some(item));
                }
            }

            match deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = tokio::time::sleep_until(deadline) => return Ok(None),
                    }
                }
                None => notified.await,
            }
        }
    }

    async fn list_len(&self, key: &str) -> Result<usize, StoreError> {
        self.ensure_available()?;
        let now = Instant::now();
        let mut state = self.state.lock().await;
        match state.live(key, now) {
            None => Ok(0),
            Some(Entry {
                value: Value::List(list),
                ..
            }) => Ok(list.len()),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.ensure_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn incr_creates_missing_keys_at_zero() {
        let kv = InMemoryKvStore::new();
        assert_eq!(kv.incr("rate:a").await.unwrap(), 1);
        assert_eq!(kv.incr("rate:a").await.unwrap(), 2);
        assert_eq!(kv.get("rate:a").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn incr_rejects_non_integer_values() {
        let kv = InMemoryKvStore::new();
        kv.set("k", "hello", None).await.unwrap();
        assert_eq!(
            kv.incr("k").await.unwrap_err(),
            StoreError::WrongType("k".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn incr_keeps_existing_ttl() {
        let kv = InMemoryKvStore::new();
        kv.incr("k").await.unwrap();
        assert!(kv.expire("k", Duration::from_secs(60)).await.unwrap());

        tokio::time::advance(Duration::from_secs(10)).await;
        kv.incr("k").await.unwrap();
        assert_eq!(kv.ttl("k").await, Some(Duration::from_secs(50)));
    }

    #[tokio::test]
    async fn expire_on_missing_key_is_false() {
        let kv = InMemoryKvStore::new();
        assert!(!kv.expire("nope", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn expire_if_unset_leaves_an_existing_ttl_alone() {
        let kv = InMemoryKvStore::new();
        kv.incr("k").await.unwrap();
        assert!(kv.expire_if_unset("k", Duration::from_secs(60)).await.unwrap());

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(!kv.expire_if_unset("k", Duration::from_secs(60)).await.unwrap());
        assert_eq!(kv.ttl("k").await, Some(Duration::from_secs(50)));

        assert!(!kv.expire_if_unset("missing", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn out_of_range_ttl_is_an_error_not_a_panic() {
        let kv = InMemoryKvStore::new();
        let huge = Duration::from_secs(u64::MAX);

        assert!(matches!(
            kv.set("k", "v", Some(huge)).await,
            Err(StoreError::Other(_))
        ));
        kv.incr("n").await.unwrap();
        assert!(matches!(kv.expire("n", huge).await, Err(StoreError::Other(_))));
        assert!(matches!(
            kv.expire_if_unset("n", huge).await,
            Err(StoreError::Other(_))
        ));
        assert_eq!(kv.ttl("n").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_disappear_after_ttl() {
        let kv = InMemoryKvStore::new();
        kv.set("user:1", "{}", Some(Duration::from_secs(60))).await.unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(kv.get("user:1").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(kv.get("user:1").await.unwrap().is_none());
        assert_eq!(kv.incr("user:1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn lists_are_fifo() {
        let kv = InMemoryKvStore::new();
        kv.push("q", "a").await.unwrap();
        kv.push("q", "b").await.unwrap();
        assert_eq!(kv.list_len("q").await.unwrap(), 2);

        assert_eq!(kv.blocking_pop("q", None).await.unwrap().as_deref(), Some("a"));
        assert_eq!(kv.blocking_pop("q", None).await.unwrap().as_deref(), Some("b"));
        assert_eq!(kv.list_len("q").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn list_operations_on_strings_are_wrong_type() {
        let kv = InMemoryKvStore::new();
        kv.set("q", "x", None).await.unwrap();
        assert!(kv.push("q", "a").await.is_err());
        assert!(kv.blocking_pop("q", Some(Duration::from_millis(1))).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn pop_times_out_when_empty() {
        let kv = InMemoryKvStore::new();
        let start = Instant::now();
        let popped = kv.blocking_pop("q", Some(Duration::from_millis(500))).await.unwrap();
        assert_eq!(popped, None);
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn push_wakes_blocked_pop() {
        let kv = Arc::new(InMemoryKvStore::new());

        let waiter = tokio::spawn({
            let kv = kv.clone();
            async move { kv.blocking_pop("q", None).await.unwrap() }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        kv.push("q", "job").await.unwrap();

        assert_eq!(waiter.await.unwrap().as_deref(), Some("job"));
    }

    #[tokio::test]
    async fn each_item_goes_to_exactly_one_waiter() {
        let kv = Arc::new(InMemoryKvStore::new());

        let waiters: Vec<_> = (0..2)
            .map(|_| {
                let kv = kv.clone();
                tokio::spawn(async move {
                    kv.blocking_pop("q", Some(Duration::from_millis(300)))
                        .await
                        .unwrap()
                })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        kv.push("q", "only-one").await.unwrap();

        let mut delivered = Vec::new();
        for w in waiters {
            if let Some(item) = w.await.unwrap() {
                delivered.push(item);
            }
        }
        assert_eq!(delivered, vec!["only-one".to_string()]);
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_operation() {
        let kv = InMemoryKvStore::new();
        kv.set_available(false);

        assert_eq!(kv.incr("k").await.unwrap_err(), StoreError::Unavailable);
        assert_eq!(kv.get("k").await.unwrap_err(), StoreError::Unavailable);
        assert_eq!(kv.push("q", "a").await.unwrap_err(), StoreError::Unavailable);
        assert_eq!(kv.ping().await.unwrap_err(), StoreError::Unavailable);

        kv.set_available(true);
        assert!(kv.ping().await.is_ok());
    }

    #[tokio::test]
    async fn losing_the_store_wakes_blocked_pop_with_an_error() {
        let kv = Arc::new(InMemoryKvStore::new());

        let waiter = tokio::spawn({
            let kv = kv.clone();
            async move { kv.blocking_pop("q", None).await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        kv.set_available(false);

        assert_eq!(waiter.await.unwrap().unwrap_err(), StoreError::Unavailable);
    }
}
