//! InMemoryCatalog - 開発用・テスト用の Catalog
//!
//! レース進行プロセス（外部）の代わりに、セッション状態を書き換える口も持ちます。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{
    Discipline, Driver, DriverId, Event, EventId, Participation, ParticipationId, StoreError,
    TaskDefinition,
};
use crate::ports::Catalog;

#[derive(Default)]
struct CatalogState {
    drivers: HashMap<DriverId, Driver>,
    events: HashMap<EventId, Event>,
    participations: HashMap<ParticipationId, Participation>,
    /// Keyed by code; insertion order kept for deterministic evaluation order.
    tasks: Vec<TaskDefinition>,
}

#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    state: Arc<RwLock<CatalogState>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_driver(&self, driver: Driver) {
        self.state.write().await.drivers.insert(driver.id, driver);
    }

    pub async fn put_event(&self, event: Event) {
        self.state.write().await.events.insert(event.id, event);
    }

    /// Insert or replace a session (the race progression process owns these).
    pub async fn put_participation(&self, participation: Participation) {
        self.state
            .write()
            .await
            .participations
            .insert(participation.id, participation);
    }

    /// Insert or replace a task definition, matched by code.
    pub async fn put_task(&self, task: TaskDefinition) {
        let mut state = self.state.write().await;
        match state.tasks.iter_mut().find(|t| t.code == task.code) {
            Some(slot) => *slot = task,
            None => state.tasks.push(task),
        }
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn driver(&self, id: DriverId) -> Result<Option<Driver>, StoreError> {
        Ok(self.state.read().await.drivers.get(&id).cloned())
    }

    async fn event(&self, id: EventId) -> Result<Option<Event>, StoreError> {
        Ok(self.state.read().await.events.get(&id).cloned())
    }

    async fn participation(
        &self,
        id: ParticipationId,
    ) -> Result<Option<Participation>, StoreError> {
        Ok(self.state.read().await.participations.get(&id).cloned())
    }

    async fn tasks_for_discipline(
        &self,
        discipline: Discipline,
    ) -> Result<Vec<TaskDefinition>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .tasks
            .iter()
            .filter(|t| t.discipline == discipline)
            .cloned()
            .collect())
    }

    async fn task_by_code(&self, code: &str) -> Result<Option<TaskDefinition>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .tasks
            .iter()
            .find(|t| t.code == code)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RepeatPolicy, Requirements, Scope, TaskId};

    fn task(code: &str, discipline: Discipline) -> TaskDefinition {
        TaskDefinition {
            id: TaskId::random(),
            code: code.to_string(),
            name: code.to_string(),
            discipline,
            scope: Scope::Global,
            active: true,
            event_related: true,
            requirements: Requirements::default(),
            policy: RepeatPolicy::default(),
        }
    }

    #[tokio::test]
    async fn tasks_are_filtered_by_discipline_and_replaced_by_code() {
        let catalog = InMemoryCatalog::new();
        catalog.put_task(task("first_win", Discipline::Gt)).await;
        catalog.put_task(task("first_stage", Discipline::Rally)).await;

        let mut replacement = task("first_win", Discipline::Gt);
        replacement.active = false;
        catalog.put_task(replacement).await;

        let gt = catalog.tasks_for_discipline(Discipline::Gt).await.unwrap();
        assert_eq!(gt.len(), 1);
        assert!(!gt[0].active);
        assert!(catalog.task_by_code("first_stage").await.unwrap().is_some());
        assert!(catalog.task_by_code("missing").await.unwrap().is_none());
    }
}
