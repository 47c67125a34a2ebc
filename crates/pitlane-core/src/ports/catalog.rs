//! Catalog port - 外部コラボレータの読み取り専用ビュー
//!
//! ドライバー・イベント・セッション・タスク定義はエンジンの外で管理されます。
//! エンジンはこの trait 経由で読むだけです。

use async_trait::async_trait;

use crate::domain::{
    Discipline, Driver, DriverId, Event, EventId, Participation, ParticipationId, StoreError,
    TaskDefinition,
};

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn driver(&self, id: DriverId) -> Result<Option<Driver>, StoreError>;

    async fn event(&self, id: EventId) -> Result<Option<Event>, StoreError>;

    async fn participation(&self, id: ParticipationId) -> Result<Option<Participation>, StoreError>;

    /// Task definitions of a discipline, including inactive ones.
    async fn tasks_for_discipline(
        &self,
        discipline: Discipline,
    ) -> Result<Vec<TaskDefinition>, StoreError>;

    async fn task_by_code(&self, code: &str) -> Result<Option<TaskDefinition>, StoreError>;
}
