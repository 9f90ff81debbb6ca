//! RateLimiter - 固定ウィンドウのリクエストカウンタ
//!
//! # アルゴリズム
//! 1. `INCR rate:<client>`
//! 2. キーに TTL が無ければ `EXPIRE window NX`（実質ウィンドウの最初の 1 回）
//! 3. 結果が limit を超えたら Deny
//!
//! TTL が既にあれば上書きしないので、以降のリクエストでウィンドウは延長されない。
//! 最初の EXPIRE が失敗しても次のリクエストで TTL が付くため、
//! カウンタが期限なしで残り続けることはない。キーが消えるとカウントは 0 に戻る。
//!
//! ストアに届かない場合は fail-open（Allow）。エラーはログにだけ残す。

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::StoreError;
use crate::ports::KvStore;

const RATE_KEY_PREFIX: &str = "rate:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Requests allowed per window.
    pub limit: u64,
    pub window: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            limit: 5,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allow,
    Deny,
}

impl Admission {
    pub fn is_allowed(self) -> bool {
        matches!(self, Admission::Allow)
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    kv: Arc<dyn KvStore>,
    policy: RateLimitPolicy,
}

impl RateLimiter {
    pub fn new(kv: Arc<dyn KvStore>, policy: RateLimitPolicy) -> Self {
        Self { kv, policy }
    }

    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    pub async fn admit(&self, client_key: &str) -> Admission {
        match self.count(client_key).await {
            Ok(count) if count > self.limit() => {
                debug!(client = client_key, count, limit = self.policy.limit, "request denied");
                Admission::Deny
            }
            Ok(_) => Admission::Allow,
            Err(err) => {
                warn!(
                    client = client_key,
                    error = %err,
                    "rate limiter unavailable, admitting request"
                );
                Admission::Allow
            }
        }
    }

    fn limit(&self) -> i64 {
        // a counter can never exceed i64::MAX
        i64::try_from(self.policy.limit).unwrap_or(i64::MAX)
    }

    async fn count(&self, client_key: &str) -> Result<i64, StoreError> {
        let key = format!("{RATE_KEY_PREFIX}{client_key}");
        let count = self.kv.incr(&key).await?;
        self.kv.expire_if_unset(&key, self.policy.window).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryKvStore;
    use crate::impls::flaky_kv::{FlakyKvStore, KvOp};
    use rstest::rstest;

    fn limiter(limit: u64) -> (Arc<InMemoryKvStore>, RateLimiter) {
        let kv = Arc::new(InMemoryKvStore::new());
        let policy = RateLimitPolicy {
            limit,
            window: Duration::from_secs(60),
        };
        (kv.clone(), RateLimiter::new(kv, policy))
    }

    #[rstest]
    #[case::limit_one(1)]
    #[case::limit_five(5)]
    #[case::limit_ten(10)]
    #[tokio::test]
    async fn request_after_the_limit_is_denied(#[case] limit: u64) {
        let (_, limiter) = limiter(limit);
        for _ in 0..limit {
            assert_eq!(limiter.admit("10.0.0.1").await, Admission::Allow);
        }
        assert_eq!(limiter.admit("10.0.0.1").await, Admission::Deny);
    }

    #[tokio::test(start_paused = true)]
    async fn six_requests_in_ten_seconds_with_limit_five() {
        let (_, limiter) = limiter(5);
        let mut results = Vec::new();
        for _ in 0..6 {
            results.push(limiter.admit("10.0.0.1").await);
            tokio::time::advance(Duration::from_millis(1500)).await;
        }
        assert_eq!(
            results,
            vec![
                Admission::Allow,
                Admission::Allow,
                Admission::Allow,
                Admission::Allow,
                Admission::Allow,
                Admission::Deny,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn window_resets_after_expiry() {
        let (_, limiter) = limiter(5);
        for _ in 0..6 {
            limiter.admit("10.0.0.1").await;
        }
        assert_eq!(limiter.admit("10.0.0.1").await, Admission::Deny);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(limiter.admit("10.0.0.1").await, Admission::Allow);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_is_set_once_per_window() {
        let (kv, limiter) = limiter(5);
        limiter.admit("c").await;
        tokio::time::advance(Duration::from_secs(30)).await;
        limiter.admit("c").await;

        // second request did not push the window out
        assert_eq!(kv.ttl("rate:c").await, Some(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn clients_are_counted_separately() {
        let (_, limiter) = limiter(1);
        assert!(limiter.admit("a").await.is_allowed());
        assert!(!limiter.admit("a").await.is_allowed());
        assert!(limiter.admit("b").await.is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn window_gets_an_expiry_even_if_the_first_expire_fails() {
        let kv = Arc::new(FlakyKvStore::new());
        kv.fail_next(KvOp::Expire, 1);
        let limiter = RateLimiter::new(kv.clone(), RateLimitPolicy::default());

        // first request fails open, the next one repairs the missing TTL
        for _ in 0..5 {
            assert_eq!(limiter.admit("c").await, Admission::Allow);
        }
        assert_eq!(limiter.admit("c").await, Admission::Deny);
        assert!(kv.inner().ttl("rate:c").await.is_some());

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(limiter.admit("c").await, Admission::Allow);
    }

    #[tokio::test]
    async fn limit_beyond_counter_range_never_denies() {
        let kv = Arc::new(InMemoryKvStore::new());
        let policy = RateLimitPolicy {
            limit: u64::MAX,
            window: Duration::from_secs(60),
        };
        let limiter = RateLimiter::new(kv, policy);
        for _ in 0..3 {
            assert_eq!(limiter.admit("c").await, Admission::Allow);
        }
    }

    #[tokio::test]
    async fn fails_open_when_store_is_down() {
        let (kv, limiter) = limiter(1);
        kv.set_available(false);
        for _ in 0..5 {
            assert_eq!(limiter.admit("10.0.0.1").await, Admission::Allow);
        }
    }
}
