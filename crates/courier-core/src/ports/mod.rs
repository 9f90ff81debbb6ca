//! Ports - 抽象化レイヤー
//!
//! 外部システム（KV store, primary store）と時刻・ID 生成への
//! インターフェース。実装は `impls` にある。

pub mod clock;
pub mod entity_store;
pub mod id_generator;
pub mod kv_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::entity_store::EntityStore;
pub use self::id_generator::{IdGenerator, MillisIdGenerator, UlidIdGenerator};
pub use self::kv_store::KvStore;
