//! IdGenerator port - TaskId 生成の抽象化
//!
//! # 実装
//! - **MillisIdGenerator**: `task_<unix millis>`（単一プロセス向け、デフォルト）
//! - **UlidIdGenerator**: `task_<ULID>`（複数プロセスから投入する場合）

use std::sync::atomic::{AtomicI64, Ordering};

use ulid::Ulid;

use crate::domain::TaskId;
use crate::ports::Clock;

pub trait IdGenerator: Send + Sync {
    fn next_task_id(&self) -> TaskId;
}

/// ミリ秒タイムスタンプ由来の ID
///
/// 同じミリ秒に 2 件投入されると素朴な実装では衝突するので、
/// 時計が進んでいなければ直前の値 + 1 を使う。
/// 生成器の生存期間中は一意かつ単調増加。
pub struct MillisIdGenerator<C> {
    clock: C,
    last: AtomicI64,
}

impl<C: Clock> MillisIdGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            last: AtomicI64::new(0),
        }
    }
}

impl<C: Clock> IdGenerator for MillisIdGenerator<C> {
    fn next_task_id(&self) -> TaskId {
        let now = self.clock.now().timestamp_millis();
        let bump = |last: i64| Some(now.max(last.saturating_add(1)));
        // fetch_update with a closure that always returns Some cannot fail
        let previous = match self.last.fetch_update(Ordering::SeqCst, Ordering::SeqCst, bump) {
            Ok(previous) | Err(previous) => previous,
        };
        TaskId::with_suffix(now.max(previous.saturating_add(1)))
    }
}

/// ULID ベースの ID（時刻部分は Clock から取る）
pub struct UlidIdGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidIdGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidIdGenerator<C> {
    fn next_task_id(&self) -> TaskId {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        TaskId::with_suffix(ulid)
    }
}
