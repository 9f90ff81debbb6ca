//! InMemoryEntityStore - 開発・テスト用の primary store
//!
//! - ID は ULID（小文字）で採番
//! - `reads()` で find_by_id の呼び出し回数を数える（cache hit の検証用）
//! - `put()` で既存レコードを直接書き換えられる（cache の staleness 検証用）

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use ulid::Ulid;

use crate::domain::{Entity, EntityId, NewEntity, StoreError};
use crate::ports::EntityStore;

pub struct InMemoryEntityStore {
    records: Mutex<HashMap<EntityId, Entity>>,
    reads: AtomicUsize,
    available: AtomicBool,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            reads: AtomicUsize::new(0),
            available: AtomicBool::new(true),
        }
    }

    /// Insert or replace a record as-is, bypassing id assignment.
    pub async fn put(&self, entity: Entity) {
        let mut records = self.records.lock().await;
        records.insert(entity.id.clone(), entity);
    }

    /// Number of `find_by_id` calls that reached this store.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable)
        }
    }
}

impl Default for InMemoryEntityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn create(&self, fields: NewEntity) -> Result<Entity, StoreError> {
        self.ensure_available()?;
        let id = EntityId::from_raw(Ulid::new().to_string().to_lowercase());
        let entity = fields.into_entity(id);
        self.put(entity.clone()).await;
        Ok(entity)
    }

    async fn find_by_id(&self, id: &EntityId) -> Result<Option<Entity>, StoreError> {
        self.ensure_available()?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        let records = self.records.lock().await;
        Ok(records.get(id).cloned())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.ensure_available()
    }
}
