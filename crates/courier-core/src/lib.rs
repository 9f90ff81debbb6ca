//! courier-core
//!
//! 小さな分散タスクパイプラインの中核。
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task descriptor, state, entity, errors）
//! - **ports**: 抽象化レイヤー（KvStore, EntityStore, Clock, IdGenerator）
//! - **impls**: インメモリ実装（InMemoryKvStore, InMemoryEntityStore）
//! - **app**: アプリケーションロジック（queue, status, worker, rate limiter, cache, service, builder）
//! - **config**: 起動時設定

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
