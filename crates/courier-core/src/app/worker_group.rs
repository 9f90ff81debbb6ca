use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::error;

use super::worker_loop::{TaskExecutor, WorkerLoop};
use crate::ports::KvStore;

/// Worker group handle.
/// - `request_shutdown()` でワーカーは次の dequeue 待ちの時点で止まる
/// - `shutdown_and_join()` で実行中のタスクを終えてから全員の終了を待つ
/// - `abort()` はプロセス停止と同じ扱い。実行中のタスクは失われる
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` consumer loops on the same queue.
    pub fn spawn(
        n: usize,
        kv: Arc<dyn KvStore>,
        executor: Arc<dyn TaskExecutor>,
        queue_key: &str,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let joins = (0..n)
            .map(|worker_id| {
                let worker = WorkerLoop::new(worker_id, kv.clone(), executor.clone(), queue_key);
                tokio::spawn(worker.run(shutdown_rx.clone()))
            })
            .collect();

        Self { shutdown_tx, joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    pub fn request_shutdown(&self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    /// Returns how many workers ended abnormally (panicked or were cancelled).
    pub async fn shutdown_and_join(self) -> usize {
        self.request_shutdown();
        let mut failed = 0;
        for (worker_id, join) in self.joins.into_iter().enumerate() {
            if let Err(err) = join.await {
                error!(
                    worker_id,
                    panicked = err.is_panic(),
                    error = %err,
                    "worker ended abnormally"
                );
                failed += 1;
            }
        }
        failed
    }

    pub fn abort(self) {
        for join in &self.joins {
            join.abort();
        }
    }
}
