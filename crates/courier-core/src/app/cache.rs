//! CacheAside - entity 読み出しの read-through cache
//!
//! - 無効時: primary store だけを読む（cache には一切触れない）
//! - 有効時: cache hit ならそのまま返す（primary で再検証しない）
//! - miss なら primary を読み、見つかれば TTL 付きで cache に書く
//!
//! 書き込み側からの invalidation はない。TTL の間は古い値が返り得る。
//! cache は best-effort なので、KV の障害は primary へのフォールバックで吸収する。

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::{CourierError, Entity, EntityId};
use crate::ports::{EntityStore, KvStore};

const CACHE_KEY_PREFIX: &str = "user:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub enabled: bool,
    pub ttl: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl: Duration::from_secs(60),
        }
    }
}

pub fn cache_key(id: &EntityId) -> String {
    format!("{CACHE_KEY_PREFIX}{id}")
}

#[derive(Clone)]
pub struct CacheAside {
    kv: Arc<dyn KvStore>,
    primary: Arc<dyn EntityStore>,
    policy: CachePolicy,
}

impl CacheAside {
    pub fn new(kv: Arc<dyn KvStore>, primary: Arc<dyn EntityStore>, policy: CachePolicy) -> Self {
        Self {
            kv,
            primary,
            policy,
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    pub async fn read(&self, id: &EntityId) -> Result<Entity, CourierError> {
        if !self.policy.enabled {
            debug!(entity_id = %id, "cache off, reading primary store");
            return self.read_primary(id).await;
        }

        let key = cache_key(id);
        if let Some(entity) = self.lookup(&key).await {
            debug!(entity_id = %id, "cache hit");
            return Ok(entity);
        }

        debug!(entity_id = %id, "cache miss, reading primary store");
        let entity = self.read_primary(id).await?;
        self.populate(&key, &entity).await;
        Ok(entity)
    }

    async fn read_primary(&self, id: &EntityId) -> Result<Entity, CourierError> {
        self.primary
            .find_by_id(id)
            .await?
            .ok_or_else(|| CourierError::NotFound(format!("entity {id}")))
    }

    /// Any cache failure (store down, undecodable entry) counts as a miss.
    async fn lookup(&self, key: &str) -> Option<Entity> {
        let raw = match self.kv.get(key).await {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(key, error = %err, "cache read failed, falling back to primary store");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entity) => Some(entity),
            Err(err) => {
                warn!(key, error = %err, "ignoring undecodable cache entry");
                None
            }
        }
    }

    async fn populate(&self, key: &str, entity: &Entity) {
        let raw = match serde_json::to_string(entity) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key, error = %err, "could not serialize entity for cache");
                return;
            }
        };
        if let Err(err) = self.kv.set(key, &raw, Some(self.policy.ttl)).await {
            warn!(key, error = %err, "cache write failed");
        }
    }
}
