//! Settings - 起動時に一度だけ読む静的設定
//!
//! 読み込み順:
//! 1. 組み込みのデフォルト
//! 2. TOML ファイル（任意。書いたセクション・キーだけ上書き）
//! 3. 環境変数 `SERVER_NAME`, `PORT`, `USE_CACHE`
//!
//! 実行中に変更する手段はない。

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::app::cache::CachePolicy;
use crate::app::rate_limit::RateLimitPolicy;
use crate::domain::CourierError;

/// Upper bound for every TTL and window (one year).
const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub cache: CacheSettings,
    pub rate_limit: RateLimitSettings,
    pub worker: WorkerSettings,
    pub startup: StartupSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Instance name, reported by health checks and request logs.
    pub name: String,
    pub listen_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            name: "courier".to_string(),
            listen_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub limit: u64,
    pub window_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            limit: 5,
            window_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdScheme {
    /// `task_<unix millis>`
    Millis,
    /// `task_<ULID>`
    Ulid,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    pub queue_key: String,
    /// Duration of the simulated workload.
    pub task_duration_ms: u64,
    pub workers: usize,
    pub id_scheme: IdScheme,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            queue_key: "task_queue".to_string(),
            task_duration_ms: 5_000,
            workers: 1,
            id_scheme: IdScheme::Millis,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StartupSettings {
    /// Delay applied to the first request this process handles.
    pub first_request_delay_secs: Option<u64>,
    /// Only apply the delay when `server.name` equals this.
    pub delay_instance: Option<String>,
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self, CourierError> {
        match path {
            Some(p) => {
                let data = fs::read_to_string(p).map_err(|e| {
                    CourierError::Config(format!("cannot read {}: {e}", p.display()))
                })?;
                Self::from_toml_str(&data)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(data: &str) -> Result<Self, CourierError> {
        toml::from_str(data).map_err(|e| CourierError::Config(e.to_string()))
    }

    /// Apply environment overrides. `lookup` is `std::env::var(..).ok()` in the binary.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), CourierError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("SERVER_NAME") {
            self.server.name = name;
        }
        if let Some(port) = lookup("PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .map_err(|_| CourierError::Config(format!("PORT is not a port number: `{port}`")))?;
            self.server.listen_addr = format!("0.0.0.0:{port}");
        }
        if let Some(flag) = lookup("USE_CACHE") {
            // only the exact string "true" turns the cache on
            self.cache.enabled = flag == "true";
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), CourierError> {
        if self.rate_limit.limit == 0 {
            return Err(CourierError::Config("rate_limit.limit must be positive".into()));
        }
        if self.rate_limit.limit > i64::MAX as u64 {
            return Err(CourierError::Config(format!(
                "rate_limit.limit must be at most {}",
                i64::MAX
            )));
        }
        check_ttl("rate_limit.window_secs", self.rate_limit.window_secs)?;
        check_ttl("cache.ttl_secs", self.cache.ttl_secs)?;
        if self.worker.workers == 0 {
            return Err(CourierError::Config("worker.workers must be at least 1".into()));
        }
        if self.worker.queue_key.is_empty() {
            return Err(CourierError::Config("worker.queue_key must not be empty".into()));
        }
        Ok(())
    }

    pub fn rate_limit_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy {
            limit: self.rate_limit.limit,
            window: Duration::from_secs(self.rate_limit.window_secs),
        }
    }

    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy {
            enabled: self.cache.enabled,
            ttl: Duration::from_secs(self.cache.ttl_secs),
        }
    }

    pub fn task_duration(&self) -> Duration {
        Duration::from_millis(self.worker.task_duration_ms)
    }

    pub fn first_request_delay(&self) -> Option<Duration> {
        let secs = self.startup.first_request_delay_secs?;
        match &self.startup.delay_instance {
            Some(instance) if instance != &self.server.name => None,
            _ => Some(Duration::from_secs(secs)),
        }
    }
}

fn check_ttl(name: &str, secs: u64) -> Result<(), CourierError> {
    if secs == 0 {
        return Err(CourierError::Config(format!("{name} must be positive")));
    }
    if secs > MAX_TTL_SECS {
        return Err(CourierError::Config(format!(
            "{name} must be at most {MAX_TTL_SECS} (one year)"
        )));
    }
    Ok(())
}
