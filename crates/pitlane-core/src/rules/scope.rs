//! Scope/period policy: may a completion structurally exist?
//!
//! Independent of whether the requirements are met. The checks here mirror
//! the partial unique indices of the completion store; the store remains the
//! backstop under concurrent writers.

use chrono::{DateTime, TimeDelta, Utc};

use super::period::period_key;
use super::rejection::Rejection;
use crate::domain::{ParticipationId, RepeatPolicy, Scope, TaskCompletion, TaskDefinition};

/// What the policy resolved for an admitted completion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Admission {
    /// Period key the new row must carry (periodic scope only).
    pub period_key: Option<String>,
}

/// Decide whether `task` may gain a new completed row for the driver whose
/// rows for this task are `history`.
pub fn can_complete(
    task: &TaskDefinition,
    history: &[TaskCompletion],
    participation_id: Option<ParticipationId>,
    period_key_override: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Admission, Rejection> {
    let mut completed = history.iter().filter(|c| c.is_completed());

    match task.scope {
        Scope::PerParticipation => {
            let pid = participation_id.ok_or(Rejection::ParticipationRequired)?;
            if completed.any(|c| c.participation_id == Some(pid)) {
                return Err(Rejection::AlreadyCompleted);
            }
            check_cooldown(&task.policy, history, now)?;
            Ok(Admission::default())
        }
        Scope::Global => {
            if participation_id.is_some() {
                return Err(Rejection::ParticipationForbidden);
            }
            if completed.any(|c| c.participation_id.is_none() && c.period_key.is_none()) {
                return Err(Rejection::AlreadyCompleted);
            }
            check_cooldown(&task.policy, history, now)?;
            Ok(Admission::default())
        }
        Scope::Periodic { period } => {
            let key = period_key_override
                .map(str::to_string)
                .unwrap_or_else(|| period_key(period, now));
            if completed.any(|c| c.period_key.as_deref() == Some(key.as_str())) {
                return Err(Rejection::PeriodAlreadyCompleted { period_key: key });
            }
            check_cooldown(&task.policy, history, now)?;
            Ok(Admission {
                period_key: Some(key),
            })
        }
        Scope::RollingWindow { .. } => {
            if completed.next().is_some() {
                return Err(Rejection::AlreadyCompleted);
            }
            Ok(Admission::default())
        }
    }
}

/// Latest completion time among completed rows.
pub fn last_completion(history: &[TaskCompletion]) -> Option<DateTime<Utc>> {
    history
        .iter()
        .filter(|c| c.is_completed())
        .map(TaskCompletion::completed_time)
        .max()
}

/// `last + hours`, or `None` when that falls outside the representable range.
pub fn after_hours(last: DateTime<Utc>, hours: u32) -> Option<DateTime<Utc>> {
    TimeDelta::try_hours(i64::from(hours)).and_then(|d| last.checked_add_signed(d))
}

/// Reject while `cooldown_hours` have not passed since the last completion.
///
/// A cooldown reaching past the representable range never elapses.
pub fn check_cooldown(
    policy: &RepeatPolicy,
    history: &[TaskCompletion],
    now: DateTime<Utc>,
) -> Result<(), Rejection> {
    let (Some(hours), Some(last)) = (policy.cooldown_hours, last_completion(history)) else {
        return Ok(());
    };
    let ready_at = after_hours(last, hours).unwrap_or(DateTime::<Utc>::MAX_UTC);
    if now < ready_at {
        return Err(Rejection::CooldownNotElapsed { ready_at });
    }
    Ok(())
}
