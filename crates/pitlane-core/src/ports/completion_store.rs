//! CompletionStore port - completion の正本（source of truth）
//!
//! CompletionStore は以下を管理します：
//! - TaskCompletion の行（pending / in_progress / completed / failed）
//! - rolling window の積み上げ状況（WindowProgress）
//!
//! # 設計原則
//! - 一意制約（global / per_participation / periodic）は store 側でも強制する
//!   - エンジンの事前チェックは read-then-write なので、並行実行では store が最後の砦
//!   - 違反時は `StoreError::Duplicate` を返す
//! - 同一 (driver, task) の評価は呼び出し側のトランザクション／ロックで直列化する

use async_trait::async_trait;

use crate::domain::{
    CompletionId, DriverId, ParticipationId, StoreError, TaskCompletion, TaskId, WindowProgress,
};

#[async_trait]
pub trait CompletionStore: Send + Sync {
    /// All rows (any status) of one driver for one task, oldest first.
    async fn completions_for(
        &self,
        driver_id: DriverId,
        task_id: TaskId,
    ) -> Result<Vec<TaskCompletion>, StoreError>;

    /// All rows tied to one participation.
    async fn completions_for_participation(
        &self,
        participation_id: ParticipationId,
    ) -> Result<Vec<TaskCompletion>, StoreError>;

    /// Completed rows of a driver across all tasks.
    async fn completed_for_driver(&self, driver_id: DriverId)
    -> Result<Vec<TaskCompletion>, StoreError>;

    /// Completed rows of a driver that carry no participation yet.
    async fn unlinked_completed(&self, driver_id: DriverId)
    -> Result<Vec<TaskCompletion>, StoreError>;

    async fn get(&self, id: CompletionId) -> Result<Option<TaskCompletion>, StoreError>;

    /// Insert a new row. Fails with `Duplicate` when a uniqueness index
    /// would be violated.
    async fn insert(&self, completion: TaskCompletion) -> Result<(), StoreError>;

    /// Replace an existing row. Same uniqueness rules as `insert`.
    async fn update(&self, completion: TaskCompletion) -> Result<(), StoreError>;

    /// Delete pending/in-progress rows of a participation; returns how many.
    async fn delete_open_for_participation(
        &self,
        participation_id: ParticipationId,
    ) -> Result<usize, StoreError>;

    async fn window_progress(
        &self,
        driver_id: DriverId,
        task_id: TaskId,
    ) -> Result<Option<WindowProgress>, StoreError>;

    async fn save_window_progress(&self, progress: WindowProgress) -> Result<(), StoreError>;
}
