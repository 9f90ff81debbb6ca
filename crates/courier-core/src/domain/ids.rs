//! Domain identifiers (strongly-typed IDs).
//!
//! ## Phantom Type パターン
//! `Id<T>` で共通実装を提供し、`T` はマーカー型（PhantomData）として
//! TaskId と EntityId を混同できないようにする。
//!
//! 中身は文字列。KV store のキー（`task_status:<id>`）や HTTP path に
//! そのまま載るので、シリアライズ時は素の文字列になる。

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;

/// IdMarker は各 ID 型のマーカー trait
pub trait IdMarker: Send + Sync + 'static {
    /// 生成時に付けるプレフィックス（例: "task_"）
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id<T: IdMarker> {
    value: String,
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// 既存の文字列をそのまま ID として扱う（HTTP path, 保存済みレコードなど）
    pub fn from_raw(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    /// プレフィックス + suffix で新しい ID を組み立てる
    pub fn with_suffix(suffix: impl fmt::Display) -> Self {
        Self::from_raw(format!("{}{}", T::prefix(), suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn into_string(self) -> String {
        self.value
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl<T: IdMarker> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.value)
    }
}

impl<'de, T: IdMarker> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from_raw)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Task のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskMarker {}

impl IdMarker for TaskMarker {
    fn prefix() -> &'static str {
        "task_"
    }
}

/// Entity（primary store のレコード）のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityMarker {}

impl IdMarker for EntityMarker {
    fn prefix() -> &'static str {
        ""
    }
}

/// Identifier of a submitted task (poll unit for clients).
pub type TaskId = Id<TaskMarker>;

/// Identifier of a record in the primary store.
pub type EntityId = Id<EntityMarker>;
