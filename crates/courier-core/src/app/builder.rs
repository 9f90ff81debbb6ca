//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! # Fail-fast 設計
//! - build() 時に Settings を検証し、不正なら BuildError を返す
//! - 差し替えなかった port にはインメモリ実装・SystemClock を使う

use std::sync::Arc;

use super::service::Service;
use super::worker_group::WorkerGroup;
use super::worker_loop::{SimulatedWork, TaskExecutor, WorkerLoop};
use crate::config::{IdScheme, Settings};
use crate::domain::CourierError;
use crate::impls::{InMemoryEntityStore, InMemoryKvStore};
use crate::ports::{
    Clock, EntityStore, IdGenerator, KvStore, MillisIdGenerator, SystemClock, UlidIdGenerator,
};

/// # 使用例
/// ```ignore
/// let app = AppBuilder::new(settings)
///     .with_kv_store(kv)
///     .build()?;
/// let workers = app.spawn_workers();
/// let id = app.service().submit("10.0.0.1", "hello").await?;
/// ```
pub struct AppBuilder {
    settings: Settings,
    kv: Option<Arc<dyn KvStore>>,
    primary: Option<Arc<dyn EntityStore>>,
    executor: Option<Arc<dyn TaskExecutor>>,
    clock: Option<Arc<dyn Clock>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] CourierError),
}

impl AppBuilder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            kv: None,
            primary: None,
            executor: None,
            clock: None,
        }
    }

    pub fn with_kv_store(mut self, kv: Arc<dyn KvStore>) -> Self {
        self.kv = Some(kv);
        self
    }

    pub fn with_entity_store(mut self, primary: Arc<dyn EntityStore>) -> Self {
        self.primary = Some(primary);
        self
    }

    /// Replace the simulated workload with real work.
    pub fn with_executor(mut self, executor: Arc<dyn TaskExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<App, BuildError> {
        self.settings.validate()?;

        let kv = self
            .kv
            .unwrap_or_else(|| Arc::new(InMemoryKvStore::new()));
        let primary = self
            .primary
            .unwrap_or_else(|| Arc::new(InMemoryEntityStore::new()));
        let executor = self
            .executor
            .unwrap_or_else(|| Arc::new(SimulatedWork::new(self.settings.task_duration())));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let ids: Arc<dyn IdGenerator> = match self.settings.worker.id_scheme {
            IdScheme::Millis => Arc::new(MillisIdGenerator::new(clock.clone())),
            IdScheme::Ulid => Arc::new(UlidIdGenerator::new(clock.clone())),
        };

        let service = Service::new(kv.clone(), primary, ids, clock, &self.settings);
        Ok(App {
            service: Arc::new(service),
            kv,
            executor,
            settings: self.settings,
        })
    }
}

/// App はワイヤリング済みのランタイム
pub struct App {
    service: Arc<Service>,
    kv: Arc<dyn KvStore>,
    executor: Arc<dyn TaskExecutor>,
    settings: Settings,
}

impl App {
    pub fn service(&self) -> Arc<Service> {
        Arc::clone(&self.service)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Start `worker.workers` consumer loops in the background.
    pub fn spawn_workers(&self) -> WorkerGroup {
        WorkerGroup::spawn(
            self.settings.worker.workers,
            self.kv.clone(),
            self.executor.clone(),
            &self.settings.worker.queue_key,
        )
    }

    /// A single consumer driven by the caller (`run_once` / `run`).
    pub fn worker(&self, worker_id: usize) -> WorkerLoop {
        WorkerLoop::new(
            worker_id,
            self.kv.clone(),
            self.executor.clone(),
            self.settings.worker.queue_key.clone(),
        )
    }
}
