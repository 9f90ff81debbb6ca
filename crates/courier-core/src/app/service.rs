//! Service - リクエスト面（HTTP 層から呼ばれる操作）
//!
//! - submit / create_entity は rate limiter を通す
//! - read_entity は cache-aside を通す
//! - すべてのリクエストは最初に first-request ゲートを通る

use std::sync::Arc;

use serde::Serialize;
use tokio::time::Instant;
use tracing::info;

use super::cache::CacheAside;
use super::first_request::FirstRequestDelay;
use super::queue::TaskQueue;
use super::rate_limit::RateLimiter;
use super::status::StatusStore;
use crate::config::Settings;
use crate::domain::{CourierError, Entity, EntityId, NewEntity, TaskId, TaskState};
use crate::ports::{Clock, EntityStore, IdGenerator, KvStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreHealth {
    Connected,
    Down,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub server: &'static str,
    pub kv: StoreHealth,
    pub primary: StoreHealth,
    pub queue_depth: Option<usize>,
    pub handled_by: String,
    pub uptime_secs: f64,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.kv == StoreHealth::Connected && self.primary == StoreHealth::Connected
    }
}

pub struct Service {
    queue: TaskQueue,
    statuses: StatusStore,
    limiter: RateLimiter,
    cache: CacheAside,
    kv: Arc<dyn KvStore>,
    primary: Arc<dyn EntityStore>,
    first_request: FirstRequestDelay,
    instance: String,
    started_at: Instant,
}

impl Service {
    pub fn new(
        kv: Arc<dyn KvStore>,
        primary: Arc<dyn EntityStore>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        settings: &Settings,
    ) -> Self {
        Self {
            queue: TaskQueue::new(kv.clone(), ids, clock, settings.worker.queue_key.clone()),
            statuses: StatusStore::new(kv.clone()),
            limiter: RateLimiter::new(kv.clone(), settings.rate_limit_policy()),
            cache: CacheAside::new(kv.clone(), primary.clone(), settings.cache_policy()),
            kv,
            primary,
            first_request: FirstRequestDelay::new(settings.first_request_delay()),
            instance: settings.server.name.clone(),
            started_at: Instant::now(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub async fn submit(&self, client: &str, payload: &str) -> Result<TaskId, CourierError> {
        self.before_request("submit").await;
        self.admit(client).await?;
        self.queue.enqueue(payload).await
    }

    pub async fn poll_status(&self, task_id: &TaskId) -> Result<TaskState, CourierError> {
        self.before_request("poll_status").await;
        self.statuses
            .get(task_id)
            .await?
            .ok_or_else(|| CourierError::NotFound(format!("task {task_id}")))
    }

    pub async fn create_entity(
        &self,
        client: &str,
        fields: NewEntity,
    ) -> Result<Entity, CourierError> {
        self.before_request("create_entity").await;
        self.admit(client).await?;
        let entity = self.primary.create(fields).await?;
        info!(entity_id = %entity.id, "entity created");
        Ok(entity)
    }

    pub async fn read_entity(&self, id: &EntityId) -> Result<Entity, CourierError> {
        self.before_request("read_entity").await;
        self.cache.read(id).await
    }

    pub async fn health(&self) -> HealthReport {
        self.before_request("health").await;
        let kv = match self.kv.ping().await {
            Ok(()) => StoreHealth::Connected,
            Err(_) => StoreHealth::Down,
        };
        let primary = match self.primary.ping().await {
            Ok(()) => StoreHealth::Connected,
            Err(_) => StoreHealth::Down,
        };
        let queue_depth = match kv {
            StoreHealth::Connected => self.queue.depth().await.ok(),
            StoreHealth::Down => None,
        };

        HealthReport {
            server: "up",
            kv,
            primary,
            queue_depth,
            handled_by: self.instance.clone(),
            uptime_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }

    async fn before_request(&self, operation: &'static str) {
        info!(operation, handled_by = %self.instance, "request");
        self.first_request.gate().await;
    }

    async fn admit(&self, client: &str) -> Result<(), CourierError> {
        if self.limiter.admit(client).await.is_allowed() {
            Ok(())
        } else {
            Err(CourierError::RateLimited(client.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use crate::impls::{InMemoryEntityStore, InMemoryKvStore};
    use crate::ports::{FixedClock, MillisIdGenerator};
    use std::time::Duration;

    struct Fixture {
        kv: Arc<InMemoryKvStore>,
        primary: Arc<InMemoryEntityStore>,
        service: Service,
    }

    fn fixture(settings: Settings) -> Fixture {
        let kv = Arc::new(InMemoryKvStore::new());
        let primary = Arc::new(InMemoryEntityStore::new());
        let clock = Arc::new(FixedClock::from_millis(1_700_000_000_000));
        let service = Service::new(
            kv.clone(),
            primary.clone(),
            Arc::new(MillisIdGenerator::new(clock.clone())),
            clock,
            &settings,
        );
        Fixture {
            kv,
            primary,
            service,
        }
    }

    #[tokio::test]
    async fn submitted_task_is_immediately_queued() {
        let f = fixture(Settings::default());
        let id = f.service.submit("10.0.0.1", "hello").await.unwrap();
        assert_eq!(id.as_str(), "task_1700000000000");
        assert_eq!(f.service.poll_status(&id).await.unwrap(), TaskState::Queued);
    }

    #[tokio::test]
    async fn unknown_task_is_not_found() {
        let f = fixture(Settings::default());
        let err = f
            .service
            .poll_status(&TaskId::from_raw("task_0"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn sixth_submission_in_a_window_is_rejected() {
        let f = fixture(Settings::default());
        for i in 0..5 {
            f.service.submit("10.0.0.1", &format!("job-{i}")).await.unwrap();
        }
        let err = f.service.submit("10.0.0.1", "job-5").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimited);

        // another client still has budget
        assert!(f.service.submit("10.0.0.2", "job").await.is_ok());
    }

    #[tokio::test]
    async fn empty_submission_is_a_validation_error() {
        let f = fixture(Settings::default());
        let err = f.service.submit("10.0.0.1", "").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn entity_creation_is_rate_limited() {
        let f = fixture(Settings::default());
        for _ in 0..5 {
            f.service
                .create_entity("10.0.0.9", NewEntity::default())
                .await
                .unwrap();
        }
        let err = f
            .service
            .create_entity("10.0.0.9", NewEntity::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimited);
    }

    #[tokio::test]
    async fn created_entities_are_readable() {
        let mut settings = Settings::default();
        settings.cache.enabled = true;
        let f = fixture(settings);

        let created = f
            .service
            .create_entity(
                "10.0.0.1",
                NewEntity {
                    name: Some("Ada".into()),
                    email: Some("ada@example.com".into()),
                },
            )
            .await
            .unwrap();

        assert_eq!(f.service.read_entity(&created.id).await.unwrap(), created);
        assert_eq!(f.service.read_entity(&created.id).await.unwrap(), created);
        assert_eq!(f.primary.reads(), 1);
    }

    #[tokio::test]
    async fn health_reports_each_store() {
        let f = fixture(Settings::default());
        f.service.submit("c", "hello").await.unwrap();

        let report = f.service.health().await;
        assert!(report.is_healthy());
        assert_eq!(report.queue_depth, Some(1));
        assert_eq!(report.handled_by, "courier");

        f.kv.set_available(false);
        let report = f.service.health().await;
        assert!(!report.is_healthy());
        assert_eq!(report.kv, StoreHealth::Down);
        assert_eq!(report.primary, StoreHealth::Connected);
        assert_eq!(report.queue_depth, None);
    }

    #[tokio::test]
    async fn submit_fails_loudly_when_kv_is_down_even_though_limiter_fails_open() {
        let f = fixture(Settings::default());
        f.kv.set_available(false);
        let err = f.service.submit("c", "hello").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
    }

    #[tokio::test(start_paused = true)]
    async fn first_request_is_delayed_once() {
        let mut settings = Settings::default();
        settings.startup.first_request_delay_secs = Some(40);
        let f = fixture(settings);

        let start = Instant::now();
        f.service.health().await;
        assert_eq!(start.elapsed(), Duration::from_secs(40));

        let start = Instant::now();
        f.service.health().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
