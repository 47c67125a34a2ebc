//! Structural-eligibility rejections.
//!
//! These are normal negative outcomes, not failures: the orchestrator records
//! them and moves on to the next task.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum Rejection {
    #[error("a participation is required for per-participation tasks")]
    ParticipationRequired,

    #[error("global tasks cannot be tied to a participation")]
    ParticipationForbidden,

    #[error("task already completed")]
    AlreadyCompleted,

    #[error("task already completed for period {period_key}")]
    PeriodAlreadyCompleted { period_key: String },

    #[error("cooldown not elapsed, next completion allowed at {ready_at}")]
    CooldownNotElapsed { ready_at: DateTime<Utc> },

    #[error("maximum of {max} completions reached")]
    MaxCompletionsReached { max: u32 },

    #[error("same event already completed {count} time(s) in window (limit {cap})")]
    SameEventLimit { count: u32, cap: u32 },

    #[error("same event configuration already completed {count} time(s) in window (limit {cap})")]
    SameSignatureLimit { count: u32, cap: u32 },

    #[error("same event configuration on cooldown until {ready_at}")]
    SignatureCooldown { ready_at: DateTime<Utc> },

    #[error("event configuration repeated within diversity window")]
    EventNotDiverse,

    #[error("completion already recorded")]
    DuplicateCompletion,
}

impl Rejection {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::ParticipationRequired => "participation_required",
            Rejection::ParticipationForbidden => "participation_forbidden",
            Rejection::AlreadyCompleted => "already_completed",
            Rejection::PeriodAlreadyCompleted { .. } => "period_already_completed",
            Rejection::CooldownNotElapsed { .. } => "cooldown_not_elapsed",
            Rejection::MaxCompletionsReached { .. } => "max_completions_reached",
            Rejection::SameEventLimit { .. } => "same_event_limit",
            Rejection::SameSignatureLimit { .. } => "same_signature_limit",
            Rejection::SignatureCooldown { .. } => "signature_cooldown",
            Rejection::EventNotDiverse => "event_not_diverse",
            Rejection::DuplicateCompletion => "duplicate_completion",
        }
    }
}
