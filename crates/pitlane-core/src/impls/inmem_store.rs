//! InMemoryCompletionStore - 開発用・テスト用の CompletionStore
//!
//! # 実装詳細
//! - tokio の Mutex で排他制御（1 ロック = 1 トランザクション相当）
//! - insert / update 時に部分一意インデックス相当のチェックを行う

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    CompletionId, DriverId, ParticipationId, StoreError, TaskCompletion, TaskId, WindowProgress,
};
use crate::ports::CompletionStore;

#[derive(Default)]
struct StoreState {
    /// All completion rows (single source of truth).
    rows: HashMap<CompletionId, TaskCompletion>,

    /// Insertion order, for stable listings.
    order: Vec<CompletionId>,

    windows: HashMap<(DriverId, TaskId), WindowProgress>,
}

impl StoreState {
    fn listed<'a>(
        &'a self,
        mut pred: impl FnMut(&TaskCompletion) -> bool + 'a,
    ) -> impl Iterator<Item = &'a TaskCompletion> + 'a {
        self.order
            .iter()
            .filter_map(|id| self.rows.get(id))
            .filter(move |c| pred(*c))
    }

    /// Partial unique indices:
    /// - completed (driver, task, participation) where participation is set
    /// - completed (driver, task, period_key) where period_key is set
    /// - completed (driver, task) where participation and period_key are null
    /// - open (driver, task, participation)
    fn violated_index(&self, candidate: &TaskCompletion) -> Option<&'static str> {
        self.rows
            .values()
            .filter(|other| {
                other.id != candidate.id
                    && other.driver_id == candidate.driver_id
                    && other.task_id == candidate.task_id
            })
            .find_map(|other| index_conflict(candidate, other))
    }
}

fn index_conflict(a: &TaskCompletion, b: &TaskCompletion) -> Option<&'static str> {
    if a.is_completed() && b.is_completed() {
        if a.participation_id.is_some() && a.participation_id == b.participation_id {
            return Some("completed_per_participation");
        }
        if a.period_key.is_some() && a.period_key == b.period_key {
            return Some("completed_per_period");
        }
        if a.participation_id.is_none()
            && a.period_key.is_none()
            && b.participation_id.is_none()
            && b.period_key.is_none()
        {
            return Some("completed_global");
        }
    }
    if a.status.is_open()
        && b.status.is_open()
        && a.participation_id.is_some()
        && a.participation_id == b.participation_id
    {
        return Some("open_per_participation");
    }
    None
}

/// InMemoryCompletionStore はプロセス内の CompletionStore
#[derive(Clone, Default)]
pub struct InMemoryCompletionStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryCompletionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every row, in insertion order.
    pub async fn all(&self) -> Vec<TaskCompletion> {
        let state = self.state.lock().await;
        state.listed(|_| true).cloned().collect()
    }
}

#[async_trait]
impl CompletionStore for InMemoryCompletionStore {
    async fn completions_for(
        &self,
        driver_id: DriverId,
        task_id: TaskId,
    ) -> Result<Vec<TaskCompletion>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .listed(|c| c.driver_id == driver_id && c.task_id == task_id)
            .cloned()
            .collect())
    }

    async fn completions_for_participation(
        &self,
        participation_id: ParticipationId,
    ) -> Result<Vec<TaskCompletion>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .listed(|c| c.participation_id == Some(participation_id))
            .cloned()
            .collect())
    }

    async fn completed_for_driver(
        &self,
        driver_id: DriverId,
    ) -> Result<Vec<TaskCompletion>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .listed(|c| c.driver_id == driver_id && c.is_completed())
            .cloned()
            .collect())
    }

    async fn unlinked_completed(
        &self,
        driver_id: DriverId,
    ) -> Result<Vec<TaskCompletion>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .listed(|c| c.driver_id == driver_id && c.is_completed() && c.participation_id.is_none())
            .cloned()
            .collect())
    }

    async fn get(&self, id: CompletionId) -> Result<Option<TaskCompletion>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.rows.get(&id).cloned())
    }

    async fn insert(&self, completion: TaskCompletion) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.rows.contains_key(&completion.id) {
            return Err(StoreError::Duplicate(format!("id {}", completion.id)));
        }
        if let Some(index) = state.violated_index(&completion) {
            return Err(StoreError::Duplicate(index.to_string()));
        }
        state.order.push(completion.id);
        state.rows.insert(completion.id, completion);
        Ok(())
    }

    async fn update(&self, completion: TaskCompletion) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.rows.contains_key(&completion.id) {
            return Err(StoreError::NotFound(completion.id.to_string()));
        }
        if let Some(index) = state.violated_index(&completion) {
            return Err(StoreError::Duplicate(index.to_string()));
        }
        state.rows.insert(completion.id, completion);
        Ok(())
    }

    async fn delete_open_for_participation(
        &self,
        participation_id: ParticipationId,
    ) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        let doomed: Vec<CompletionId> = state
            .listed(|c| c.participation_id == Some(participation_id) && c.status.is_open())
            .map(|c| c.id)
            .collect();
        for id in &doomed {
            state.rows.remove(id);
        }
        state.order.retain(|id| !doomed.contains(id));
        Ok(doomed.len())
    }

    async fn window_progress(
        &self,
        driver_id: DriverId,
        task_id: TaskId,
    ) -> Result<Option<WindowProgress>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.windows.get(&(driver_id, task_id)).cloned())
    }

    async fn save_window_progress(&self, progress: WindowProgress) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state
            .windows
            .insert((progress.driver_id, progress.task_id), progress);
        Ok(())
    }
}
