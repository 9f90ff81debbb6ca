//! EntityStore port - primary store（正本）
//!
//! entity の作成と ID による読み出しだけを扱う。
//! cache はこのストアの前に置かれるが、正本は常にこちら。

use async_trait::async_trait;

use crate::domain::{Entity, EntityId, NewEntity, StoreError};

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn create(&self, fields: NewEntity) -> Result<Entity, StoreError>;

    /// `Ok(None)` when no record has this id.
    async fn find_by_id(&self, id: &EntityId) -> Result<Option<Entity>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
