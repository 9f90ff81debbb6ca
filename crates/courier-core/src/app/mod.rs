//! App - アプリケーション層
//!
//! ports を組み合わせてアプリケーションロジックを実装する。
//!
//! # 主要コンポーネント
//! - **TaskQueue**: タスク投入（descriptor push + status 初期化）
//! - **StatusStore**: taskId -> state
//! - **WorkerLoop / WorkerGroup**: dequeue → execute → completed
//! - **RateLimiter**: 固定ウィンドウのリクエスト制限（fail-open）
//! - **CacheAside**: entity 読み出しの read-through cache
//! - **Service**: リクエスト面
//! - **AppBuilder**: ワイヤリング

pub mod builder;
pub mod cache;
pub mod first_request;
pub mod queue;
pub mod rate_limit;
pub mod service;
pub mod status;
pub mod worker_group;
pub mod worker_loop;

// 主要な型を再エクスポート
pub use self::builder::{App, AppBuilder, BuildError};
pub use self::cache::{CacheAside, CachePolicy};
pub use self::first_request::FirstRequestDelay;
pub use self::queue::TaskQueue;
pub use self::rate_limit::{Admission, RateLimitPolicy, RateLimiter};
pub use self::service::{HealthReport, Service, StoreHealth};
pub use self::status::StatusStore;
pub use self::worker_group::WorkerGroup;
pub use self::worker_loop::{Iteration, SimulatedWork, TaskExecutor, WorkerLoop};
