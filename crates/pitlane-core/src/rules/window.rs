//! Rolling-window accumulator.
//!
//! Collects qualifying sessions per (driver, task) until the window threshold
//! is reached. Only then does the orchestrator attempt the completion, with
//! the contributing session ids as `achieved_by`.

use chrono::{DateTime, Utc};

use crate::domain::{ParticipationId, WindowProgress, WindowSpec, WindowUnit};

/// What recording one session did to the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowStep {
    /// Progress recorded; threshold not yet reached.
    Accumulating { count: u32, needed: u32 },
    /// Threshold reached. Progress has been cleared.
    Reached { achieved_by: Vec<ParticipationId> },
    /// A non-qualifying session broke the streak.
    Reset,
    /// Nothing changed (session already counted, or same day in `Days` mode).
    Unchanged { count: u32, needed: u32 },
}

/// Record `session` (finished at `at`) into `progress`.
pub fn record_session(
    progress: &mut WindowProgress,
    spec: WindowSpec,
    default_size: u32,
    session: ParticipationId,
    at: DateTime<Utc>,
    qualifying: bool,
) -> WindowStep {
    let needed = spec.size.unwrap_or(default_size).max(1);
    let count = |p: &WindowProgress| u32::try_from(p.sessions.len()).unwrap_or(u32::MAX);

    if progress.sessions.iter().any(|(id, _)| *id == session) {
        return WindowStep::Unchanged {
            count: count(progress),
            needed,
        };
    }

    if !qualifying {
        return match spec.unit {
            WindowUnit::Sessions if !progress.sessions.is_empty() => {
                progress.sessions.clear();
                progress.updated_at = at;
                WindowStep::Reset
            }
            _ => WindowStep::Unchanged {
                count: count(progress),
                needed,
            },
        };
    }

    if spec.unit == WindowUnit::Days
        && progress
            .sessions
            .iter()
            .any(|(_, when)| when.date_naive() == at.date_naive())
    {
        return WindowStep::Unchanged {
            count: count(progress),
            needed,
        };
    }

    progress.sessions.push((session, at));
    progress.updated_at = at;

    if count(progress) >= needed {
        let achieved_by = progress.session_ids();
        progress.sessions.clear();
        return WindowStep::Reached { achieved_by };
    }

    WindowStep::Accumulating {
        count: count(progress),
        needed,
    }
}
