use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::info;

/// 最初のリクエストだけを遅延させる one-shot ゲート（遅いインスタンスの再現用）
///
/// - `handled` は `false` で始まり、最初のリクエストで一度だけ `true` になる
/// - 遅延が設定されていなければ何もしない
#[derive(Debug)]
pub struct FirstRequestDelay {
    delay: Option<Duration>,
    handled: AtomicBool,
}

impl FirstRequestDelay {
    pub fn new(delay: Option<Duration>) -> Self {
        Self {
            delay,
            handled: AtomicBool::new(false),
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Returns `true` if this call was the delayed one.
    pub async fn gate(&self) -> bool {
        let Some(delay) = self.delay else {
            return false;
        };
        if self
            .handled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        info!(delay_secs = delay.as_secs_f64(), "delaying first request");
        tokio::time::sleep(delay).await;
        info!("first request delay finished");
        true
    }
}
