//! Task completion record and its state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{CompletionId, DriverId, EventId, ParticipationId, TaskId};

/// Completion status.
///
/// State transitions:
/// - Pending -> InProgress (requirements unmet on evaluation)
/// - Pending -> Completed (requirements met on first evaluation)
/// - InProgress -> Completed (requirements met later)
/// - Completed, Failed: terminal
///
/// Withdrawal of the owning session deletes Pending/InProgress rows outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl CompletionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, CompletionStatus::Completed | CompletionStatus::Failed)
    }

    /// Pending or in progress: still waiting on its session.
    pub fn is_open(self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompletionStatus::Pending => "pending",
            CompletionStatus::InProgress => "in_progress",
            CompletionStatus::Completed => "completed",
            CompletionStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A driver's progress on (or completion of) one task.
///
/// Design:
/// - State transitions go through methods, never direct field writes.
/// - `event_signature` + `signature_version` are stamped once when completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCompletion {
    pub id: CompletionId,
    pub driver_id: DriverId,
    pub task_id: TaskId,

    /// Required for per-participation scope, absent for global until backfilled.
    pub participation_id: Option<ParticipationId>,

    /// Required for periodic scope (`YYYY-MM-DD`, `YYYY-Www` or `YYYY-MM`).
    pub period_key: Option<String>,

    pub status: CompletionStatus,
    pub score_multiplier: f64,

    /// Event of the session that produced this completion.
    pub event_id: Option<EventId>,
    pub event_signature: Option<String>,
    pub signature_version: Option<u32>,

    /// Rolling-window scope: the ordered session ids that jointly qualified.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub achieved_by: Vec<ParticipationId>,

    pub evaluation_failed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evaluation_failure_reasons: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Signature stamped onto a finalized completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureStamp {
    pub event_id: EventId,
    pub signature: String,
    pub version: u32,
}

impl TaskCompletion {
    fn blank(
        id: CompletionId,
        driver_id: DriverId,
        task_id: TaskId,
        status: CompletionStatus,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            driver_id,
            task_id,
            participation_id: None,
            period_key: None,
            status,
            score_multiplier: 1.0,
            event_id: None,
            event_signature: None,
            signature_version: None,
            achieved_by: Vec::new(),
            evaluation_failed_at: None,
            evaluation_failure_reasons: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Pending row pre-created when a driver registers for a session.
    pub fn pending(
        id: CompletionId,
        driver_id: DriverId,
        task_id: TaskId,
        participation_id: ParticipationId,
        now: DateTime<Utc>,
    ) -> Self {
        let mut record = Self::blank(id, driver_id, task_id, CompletionStatus::Pending, now);
        record.participation_id = Some(participation_id);
        record
    }

    /// Row created directly in the completed state.
    pub fn completed(
        id: CompletionId,
        driver_id: DriverId,
        task_id: TaskId,
        now: DateTime<Utc>,
    ) -> Self {
        let mut record = Self::blank(id, driver_id, task_id, CompletionStatus::Completed, now);
        record.completed_at = Some(now);
        record
    }

    pub fn with_participation(mut self, participation_id: Option<ParticipationId>) -> Self {
        self.participation_id = participation_id;
        self
    }

    pub fn with_period_key(mut self, period_key: Option<String>) -> Self {
        self.period_key = period_key;
        self
    }

    pub fn with_achieved_by(mut self, sessions: Vec<ParticipationId>) -> Self {
        self.achieved_by = sessions;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.score_multiplier = multiplier;
        self
    }

    pub fn with_signature(mut self, stamp: Option<SignatureStamp>) -> Self {
        self.apply_signature(stamp);
        self
    }

    fn apply_signature(&mut self, stamp: Option<SignatureStamp>) {
        if let Some(stamp) = stamp {
            self.event_id = Some(stamp.event_id);
            self.event_signature = Some(stamp.signature);
            self.signature_version = Some(stamp.version);
        }
    }

    /// Requirements unmet on evaluation: keep the row open and record why.
    pub fn mark_in_progress(&mut self, reasons: Vec<String>, now: DateTime<Utc>) {
        debug_assert!(self.status.is_open());
        self.status = CompletionStatus::InProgress;
        self.evaluation_failed_at = Some(now);
        self.evaluation_failure_reasons = reasons;
        self.updated_at = now;
    }

    /// Flip an open row to completed, keeping its creation provenance.
    pub fn mark_completed(
        &mut self,
        multiplier: f64,
        stamp: Option<SignatureStamp>,
        now: DateTime<Utc>,
    ) {
        debug_assert!(self.status.is_open());
        self.status = CompletionStatus::Completed;
        self.score_multiplier = multiplier;
        self.apply_signature(stamp);
        self.evaluation_failed_at = None;
        self.evaluation_failure_reasons.clear();
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    pub fn mark_failed(&mut self, reasons: Vec<String>, now: DateTime<Utc>) {
        self.status = CompletionStatus::Failed;
        self.evaluation_failed_at = Some(now);
        self.evaluation_failure_reasons = reasons;
        self.updated_at = now;
    }

    /// Backfill: attach the session that explains an unlinked completion.
    pub fn link_participation(
        &mut self,
        participation_id: ParticipationId,
        stamp: Option<SignatureStamp>,
        now: DateTime<Utc>,
    ) {
        self.participation_id = Some(participation_id);
        if self.event_signature.is_none() {
            self.apply_signature(stamp);
        }
        self.updated_at = now;
    }

    pub fn is_completed(&self) -> bool {
        self.status == CompletionStatus::Completed
    }

    /// Time used for cooldown and window arithmetic.
    pub fn completed_time(&self) -> DateTime<Utc> {
        self.completed_at.unwrap_or(self.updated_at)
    }
}

/// Accumulated qualifying sessions of a rolling-window task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowProgress {
    pub driver_id: DriverId,
    pub task_id: TaskId,
    /// Qualifying sessions in order, with the time they finished.
    pub sessions: Vec<(ParticipationId, DateTime<Utc>)>,
    pub updated_at: DateTime<Utc>,
}

impl WindowProgress {
    pub fn new(driver_id: DriverId, task_id: TaskId, now: DateTime<Utc>) -> Self {
        Self {
            driver_id,
            task_id,
            sessions: Vec::new(),
            updated_at: now,
        }
    }

    pub fn session_ids(&self) -> Vec<ParticipationId> {
        self.sessions.iter().map(|(id, _)| *id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 2, 20, 0, 0).unwrap()
    }

    #[test]
    fn pending_to_in_progress_to_completed() {
        let mut record = TaskCompletion::pending(
            CompletionId::random(),
            DriverId::random(),
            TaskId::random(),
            ParticipationId::random(),
            now(),
        );
        assert_eq!(record.status, CompletionStatus::Pending);

        record.mark_in_progress(vec!["Minimum 10 laps required, got 4".to_string()], now());
        assert_eq!(record.status, CompletionStatus::InProgress);
        assert_eq!(record.evaluation_failure_reasons.len(), 1);
        assert!(record.evaluation_failed_at.is_some());

        let stamp = SignatureStamp {
            event_id: EventId::random(),
            signature: "ab".repeat(32),
            version: 1,
        };
        record.mark_completed(0.8, Some(stamp), now());
        assert!(record.is_completed());
        assert_eq!(record.score_multiplier, 0.8);
        assert!(record.evaluation_failure_reasons.is_empty());
        assert_eq!(record.signature_version, Some(1));
        assert_eq!(record.completed_at, Some(now()));
    }

    #[test]
    fn link_keeps_existing_signature() {
        let mut record = TaskCompletion::completed(
            CompletionId::random(),
            DriverId::random(),
            TaskId::random(),
            now(),
        )
        .with_signature(Some(SignatureStamp {
            event_id: EventId::random(),
            signature: "old".to_string(),
            version: 1,
        }));

        let session = ParticipationId::random();
        record.link_participation(
            session,
            Some(SignatureStamp {
                event_id: EventId::random(),
                signature: "new".to_string(),
                version: 1,
            }),
            now(),
        );
        assert_eq!(record.participation_id, Some(session));
        assert_eq!(record.event_signature.as_deref(), Some("old"));
    }

    #[test]
    fn terminal_states() {
        assert!(CompletionStatus::Completed.is_terminal());
        assert!(CompletionStatus::Failed.is_terminal());
        assert!(CompletionStatus::Pending.is_open());
        assert!(CompletionStatus::InProgress.is_open());
    }
}
