//! EvaluationReport - オーケストレーター呼び出し 1 回分の結果
//!
//! 呼び出し側（リクエストハンドラ・CLI）とログのための要約です。
//! completion の正本はあくまで CompletionStore にあります。

use serde::Serialize;

use crate::domain::{CompletionId, ParticipationId, TaskId};
use crate::rules::Rejection;

/// What happened to one task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    /// A completed row now exists (flipped or created).
    Completed {
        completion_id: CompletionId,
        multiplier: f64,
    },
    /// Requirements unmet; the open row records why.
    Progressed { reasons: Vec<String> },
    /// Rolling window: qualifying session recorded, threshold not reached.
    Accumulating { count: u32, needed: u32 },
    /// Not applicable to this session.
    Skipped { reason: String },
    /// Requirements met but a structural gate said no.
    Rejected { rejection: Rejection },
    /// Pending row created at registration.
    Assigned { completion_id: CompletionId },
    /// Backfill attached the session to an unlinked completion.
    Linked { completion_id: CompletionId },
    /// Open rows deleted on withdrawal.
    Discarded { count: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    /// None for participation-wide outcomes (withdrawal).
    pub task_id: Option<TaskId>,
    pub task_code: Option<String>,
    #[serde(flatten)]
    pub outcome: TaskOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub participation_id: Option<ParticipationId>,
    pub tasks: Vec<TaskReport>,
}

impl EvaluationReport {
    pub fn new(participation_id: Option<ParticipationId>) -> Self {
        Self {
            participation_id,
            tasks: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, task_id: TaskId, code: &str, outcome: TaskOutcome) {
        self.tasks.push(TaskReport {
            task_id: Some(task_id),
            task_code: Some(code.to_string()),
            outcome,
        });
    }

    pub(crate) fn push_untargeted(&mut self, outcome: TaskOutcome) {
        self.tasks.push(TaskReport {
            task_id: None,
            task_code: None,
            outcome,
        });
    }

    /// Fold another report's entries into this one.
    pub fn merge(&mut self, other: EvaluationReport) {
        self.tasks.extend(other.tasks);
    }

    pub fn outcome_for(&self, code: &str) -> Option<&TaskOutcome> {
        self.tasks
            .iter()
            .find(|t| t.task_code.as_deref() == Some(code))
            .map(|t| &t.outcome)
    }

    pub fn completed_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| matches!(t.outcome, TaskOutcome::Completed { .. }))
            .count()
    }
}
