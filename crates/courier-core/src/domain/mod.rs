//! Domain model (IDs, descriptors, states, entities, errors).

pub mod entity;
pub mod errors;
pub mod ids;
pub mod state;
pub mod task;

pub use self::entity::{Entity, NewEntity};
pub use self::errors::{CourierError, ErrorKind, StoreError};
pub use self::ids::{EntityId, Id, IdMarker, TaskId};
pub use self::state::TaskState;
pub use self::task::TaskDescriptor;
