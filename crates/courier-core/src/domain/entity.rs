use serde::{Deserialize, Serialize};

use super::ids::EntityId;

/// Record held by the primary store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(alias = "_id")]
    pub id: EntityId,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Fields accepted by `create_entity`. The store assigns the id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntity {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl NewEntity {
    pub fn into_entity(self, id: EntityId) -> Entity {
        Entity {
            id,
            name: self.name,
            email: self.email,
        }
    }
}
