//! Errors - エラー型と分類
//!
//! - `ConfigError`: タスク定義の設定ミス（ロード時に検出、致命的ではない）
//! - `StoreError`: 永続化層のエラー（一意制約違反を含む）
//! - `EngineError`: オーケストレータが呼び出し元に返すエラー

use thiserror::Error;

/// Task definition that cannot be turned into a typed definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown scope: {0}")]
    UnknownScope(String),

    #[error("periodic task requires a period granularity (daily, weekly or monthly)")]
    MissingPeriod,

    #[error("unknown period granularity: {0}")]
    UnknownPeriod(String),

    #[error("unknown window unit: {0}")]
    UnknownWindowUnit(String),

    #[error("invalid tier: {0}")]
    InvalidTier(String),

    #[error("invalid requirement {key}: {message}")]
    InvalidRequirement { key: String, message: String },

    /// The definition does not even have the raw shape.
    #[error("malformed task definition: {0}")]
    Malformed(String),
}

/// Persistence failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A uniqueness index rejected the write.
    #[error("duplicate completion: {0}")]
    Duplicate(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Error returned by the completion engine to its caller.
///
/// Scope rejections and unmet requirements are not errors; they are reported
/// through `EvaluationReport`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        EngineError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
