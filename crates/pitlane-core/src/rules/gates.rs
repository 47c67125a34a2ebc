//! Repeat gates for tasks completed more than once: lifetime cap, same-event
//! cap and signature-based diversity checks. The plain cooldown belongs to the
//! scope policy (`scope::check_cooldown`).
//!
//! Pure over a resolved history: the caller is responsible for filling in
//! signatures of rows persisted without one (or with an older version).

use chrono::{DateTime, Duration, Utc};

use super::rejection::Rejection;
use super::scope::after_hours;
use crate::domain::{EventId, RepeatPolicy};

/// A completed row of the same (driver, task), reduced to what the gates need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PastCompletion {
    pub completed_at: DateTime<Utc>,
    pub event_id: Option<EventId>,
    pub signature: Option<String>,
}

/// The completion being considered.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub event_id: EventId,
    pub signature: &'a str,
}

/// Run every repeat gate in order; the first failing one wins.
pub fn check_repeat_gates(
    policy: &RepeatPolicy,
    diversity_window: Duration,
    history: &[PastCompletion],
    candidate: Candidate<'_>,
    now: DateTime<Utc>,
) -> Result<(), Rejection> {
    if let Some(max) = policy.max_completions
        && history.len() >= max as usize
    {
        return Err(Rejection::MaxCompletionsReached { max });
    }

    let start = window_start(now, diversity_window);
    let in_window: Vec<&PastCompletion> = history
        .iter()
        .filter(|c| is_in_window(c, start))
        .collect();

    if let Some(cap) = policy.same_event_cap() {
        let count = count_u32(
            in_window
                .iter()
                .filter(|c| c.event_id == Some(candidate.event_id)),
        );
        if count >= cap {
            return Err(Rejection::SameEventLimit { count, cap });
        }
    }

    let same_signature: Vec<&&PastCompletion> = in_window
        .iter()
        .filter(|c| c.signature.as_deref() == Some(candidate.signature))
        .collect();

    if let Some(cap) = policy.max_same_signature_count {
        let count = count_u32(same_signature.iter());
        if count >= cap {
            return Err(Rejection::SameSignatureLimit { count, cap });
        }
    }

    // Signature cooldown looks at full history, not just the window.
    if let Some(hours) = policy.signature_cooldown_hours
        && let Some(last) = history
            .iter()
            .filter(|c| c.signature.as_deref() == Some(candidate.signature))
            .map(|c| c.completed_at)
            .max()
    {
        let ready_at = after_hours(last, hours).unwrap_or(DateTime::<Utc>::MAX_UTC);
        if now < ready_at {
            return Err(Rejection::SignatureCooldown { ready_at });
        }
    }

    if policy.requires_event_diversity() && !same_signature.is_empty() {
        return Err(Rejection::EventNotDiverse);
    }

    Ok(())
}

/// Number of completions inside the diversity window (diminishing returns input).
pub fn recent_count(
    history: &[PastCompletion],
    diversity_window: Duration,
    now: DateTime<Utc>,
) -> u32 {
    let start = window_start(now, diversity_window);
    count_u32(history.iter().filter(|c| is_in_window(c, start)))
}

/// `None` when the window reaches past the representable range: all history.
fn window_start(now: DateTime<Utc>, diversity_window: Duration) -> Option<DateTime<Utc>> {
    now.checked_sub_signed(diversity_window)
}

fn is_in_window(completion: &PastCompletion, start: Option<DateTime<Utc>>) -> bool {
    start.is_none_or(|start| completion.completed_at >= start)
}

fn count_u32<I: Iterator>(iter: I) -> u32 {
    u32::try_from(iter.count()).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::t0;
    use rstest::rstest;

    const SIG_A: &str = "aaaa";
    const SIG_B: &str = "bbbb";

    fn past(days_ago: i64, event_id: EventId, signature: &str) -> PastCompletion {
        PastCompletion {
            completed_at: t0() - Duration::days(days_ago),
            event_id: Some(event_id),
            signature: Some(signature.to_string()),
        }
    }

    fn repeatable() -> RepeatPolicy {
        RepeatPolicy {
            repeatable: true,
            diversity_window_days: Some(30),
            max_same_event_count: Some(1),
            ..RepeatPolicy::default()
        }
    }

    fn window() -> Duration {
        Duration::days(30)
    }

    #[test]
    fn same_event_inside_window_is_rejected() {
        let event = EventId::random();
        let history = vec![past(3, event, SIG_A)];
        let candidate = Candidate {
            event_id: event,
            signature: SIG_A,
        };
        assert_eq!(
            check_repeat_gates(&repeatable(), window(), &history, candidate, t0()),
            Err(Rejection::SameEventLimit { count: 1, cap: 1 })
        );
    }

    #[test]
    fn different_event_with_same_signature_is_rejected() {
        let history = vec![past(3, EventId::random(), SIG_A)];
        let candidate = Candidate {
            event_id: EventId::random(),
            signature: SIG_A,
        };
        assert_eq!(
            check_repeat_gates(&repeatable(), window(), &history, candidate, t0()),
            Err(Rejection::EventNotDiverse)
        );
    }

    #[test]
    fn different_configuration_passes() {
        let history = vec![past(3, EventId::random(), SIG_A)];
        let candidate = Candidate {
            event_id: EventId::random(),
            signature: SIG_B,
        };
        assert!(check_repeat_gates(&repeatable(), window(), &history, candidate, t0()).is_ok());
    }

    #[test]
    fn history_outside_window_is_ignored() {
        let event = EventId::random();
        let history = vec![past(45, event, SIG_A)];
        let candidate = Candidate {
            event_id: event,
            signature: SIG_A,
        };
        assert!(check_repeat_gates(&repeatable(), window(), &history, candidate, t0()).is_ok());
    }

    #[test]
    fn signature_cap_allows_up_to_limit() {
        let policy = RepeatPolicy {
            repeatable: true,
            require_event_diversity: Some(false),
            max_same_event_count: Some(10),
            max_same_signature_count: Some(2),
            ..RepeatPolicy::default()
        };
        let candidate = Candidate {
            event_id: EventId::random(),
            signature: SIG_A,
        };
        let one = vec![past(1, EventId::random(), SIG_A)];
        assert!(check_repeat_gates(&policy, window(), &one, candidate, t0()).is_ok());

        let two = vec![past(1, EventId::random(), SIG_A), past(2, EventId::random(), SIG_A)];
        assert_eq!(
            check_repeat_gates(&policy, window(), &two, candidate, t0()),
            Err(Rejection::SameSignatureLimit { count: 2, cap: 2 })
        );
    }

    #[test]
    fn signature_cooldown() {
        let policy = RepeatPolicy {
            repeatable: true,
            require_event_diversity: Some(false),
            signature_cooldown_hours: Some(48),
            ..RepeatPolicy::default()
        };
        let history = vec![PastCompletion {
            completed_at: t0() - Duration::hours(20),
            event_id: Some(EventId::random()),
            signature: Some(SIG_A.to_string()),
        }];
        let candidate = Candidate {
            event_id: EventId::random(),
            signature: SIG_A,
        };
        assert!(matches!(
            check_repeat_gates(&policy, window(), &history, candidate, t0()),
            Err(Rejection::SignatureCooldown { .. })
        ));
    }

    #[test]
    fn lifetime_cap() {
        let policy = RepeatPolicy {
            repeatable: true,
            max_completions: Some(2),
            ..RepeatPolicy::default()
        };
        let history = vec![past(90, EventId::random(), SIG_A), past(60, EventId::random(), SIG_B)];
        let candidate = Candidate {
            event_id: EventId::random(),
            signature: "cccc",
        };
        assert_eq!(
            check_repeat_gates(&policy, window(), &history, candidate, t0()),
            Err(Rejection::MaxCompletionsReached { max: 2 })
        );
    }

    #[test]
    fn plain_cooldown_is_left_to_scope_policy() {
        let policy = RepeatPolicy {
            repeatable: true,
            require_event_diversity: Some(false),
            max_same_event_count: Some(10),
            cooldown_hours: Some(24),
            ..RepeatPolicy::default()
        };
        let history = vec![past(0, EventId::random(), SIG_A)];
        let candidate = Candidate {
            event_id: EventId::random(),
            signature: SIG_B,
        };
        assert!(check_repeat_gates(&policy, window(), &history, candidate, t0()).is_ok());
    }

    #[rstest]
    #[case(Some(u32::MAX), None)]
    #[case(None, Some(u32::MAX))]
    fn extreme_policy_values_do_not_overflow(
        #[case] signature_cooldown_hours: Option<u32>,
        #[case] diversity_window_days: Option<u32>,
    ) {
        let policy = RepeatPolicy {
            repeatable: true,
            require_event_diversity: Some(false),
            max_same_event_count: Some(10),
            signature_cooldown_hours,
            diversity_window_days,
            ..RepeatPolicy::default()
        };
        let days = diversity_window_days.unwrap_or(30);
        let window = Duration::try_days(i64::from(days)).unwrap_or(Duration::MAX);
        let history = vec![past(400, EventId::random(), SIG_A)];
        let candidate = Candidate {
            event_id: EventId::random(),
            signature: SIG_A,
        };

        let result = check_repeat_gates(&policy, window, &history, candidate, t0());
        match signature_cooldown_hours {
            Some(_) => assert_eq!(
                result,
                Err(Rejection::SignatureCooldown {
                    ready_at: DateTime::<Utc>::MAX_UTC
                })
            ),
            None => assert!(result.is_ok()),
        }
        let expected_recent = if diversity_window_days.is_some() { 1 } else { 0 };
        assert_eq!(recent_count(&history, window, t0()), expected_recent);
    }

    #[test]
    fn recent_count_uses_window() {
        let history = vec![
            past(1, EventId::random(), SIG_A),
            past(10, EventId::random(), SIG_A),
            past(40, EventId::random(), SIG_A),
        ];
        assert_eq!(recent_count(&history, window(), t0()), 2);
    }
}
