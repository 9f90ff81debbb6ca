//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryKvStore**: 共有 KV ストア（Redis 相当）
//! - **InMemoryEntityStore**: primary store
//!
//! 本番用のアダプタ（Redis, document store）はこのクレートの外に置き、
//! `KvStore` / `EntityStore` を実装すれば差し替えられる。

#[cfg(test)]
pub(crate) mod flaky_kv;
pub mod inmem_entity;
pub mod inmem_kv;

pub use self::inmem_entity::InMemoryEntityStore;
pub use self::inmem_kv::InMemoryKvStore;
