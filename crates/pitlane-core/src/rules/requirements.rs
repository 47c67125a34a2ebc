//! Requirement predicate evaluator.
//!
//! Pure and total: a requirement that is not declared never fails. Every
//! violated predicate contributes one human-readable reason, so callers can
//! both gate completion and show the driver what was missing.

use crate::domain::{Event, OutcomeStatus, Participation, Requirements, TaskDefinition, Tier};

/// Result of testing one session against one task.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Evaluation {
    pub satisfied: bool,
    pub reasons: Vec<String>,
}

impl Evaluation {
    fn from_reasons(reasons: Vec<String>) -> Self {
        Self {
            satisfied: reasons.is_empty(),
            reasons,
        }
    }
}

/// Test `session` (run under `event`, classified as `event_tier`) against the
/// task's requirement set.
pub fn evaluate(
    task: &TaskDefinition,
    session: &Participation,
    event: &Event,
    event_tier: Option<Tier>,
) -> Evaluation {
    evaluate_requirements(&task.requirements, session, event, event_tier)
}

pub fn evaluate_requirements(
    req: &Requirements,
    session: &Participation,
    event: &Event,
    event_tier: Option<Tier>,
) -> Evaluation {
    let mut reasons = Vec::new();

    if let Some(min_tier) = req.min_tier {
        match event_tier {
            Some(tier) if tier >= min_tier => {}
            Some(tier) => reasons.push(format!(
                "Event tier must be at least {min_tier}, got {tier}"
            )),
            None => reasons.push(format!(
                "Event tier must be at least {min_tier}, got unclassified"
            )),
        }
    }

    let outcome = session.outcome;
    let finished = outcome == Some(OutcomeStatus::Finished);
    let outcome_label = outcome.map_or_else(|| "no result".to_string(), |o| o.to_string());

    // Clean finish carries its own status check, reported separately from
    // the incident/penalty condition.
    if req.require_clean_finish {
        if !finished {
            reasons.push(format!(
                "Clean finish requires a finished result, got {outcome_label}"
            ));
        }
        if session.incidents > 0 || session.penalties > 0 {
            reasons.push("Clean finish required (no incidents or penalties)".to_string());
        }
    } else if !finished && !req.allow_non_finish {
        reasons.push(format!("Session must be finished, got {outcome_label}"));
    }

    let duration = session.duration_minutes(event);
    if let Some(min) = req.min_duration_minutes
        && duration < min
    {
        reasons.push(format!(
            "Session must last at least {min} minutes, got {duration}"
        ));
    }
    if let Some(max) = req.max_duration_minutes
        && duration > max
    {
        reasons.push(format!(
            "Session must last at most {max} minutes, got {duration}"
        ));
    }

    if let Some(max) = req.max_incidents
        && session.incidents > max
    {
        reasons.push(format!(
            "At most {max} incidents allowed, got {}",
            session.incidents
        ));
    }
    if let Some(max) = req.max_penalties
        && session.penalties > max
    {
        reasons.push(format!(
            "At most {max} penalties allowed, got {}",
            session.penalties
        ));
    }

    if req.require_night && !event.rules.night {
        reasons.push("Night event required".to_string());
    }
    if req.require_dynamic_weather && !event.rules.dynamic_weather {
        reasons.push("Dynamic weather required".to_string());
    }
    if req.require_team_event && !event.rules.team_event {
        reasons.push("Team event required".to_string());
    }

    if req.min_position.is_some() || req.max_position.is_some() {
        match session.finishing_position {
            None => reasons.push("Finishing position required, got none".to_string()),
            Some(pos) => {
                if let Some(best) = req.max_position
                    && pos > best
                {
                    reasons.push(format!(
                        "Finishing position must be P{best} or better, got P{pos}"
                    ));
                }
                if let Some(worst) = req.min_position
                    && pos < worst
                {
                    reasons.push(format!(
                        "Finishing position must be P{worst} or worse, got P{pos}"
                    ));
                }
            }
        }
    }

    if let Some(min) = req.min_laps
        && session.laps_completed < min
    {
        reasons.push(format!(
            "Minimum {min} laps required, got {}",
            session.laps_completed
        ));
    }

    Evaluation::from_reasons(reasons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::{event, session};
    use chrono::Duration;
    use rstest::rstest;

    fn clean_sprint() -> Requirements {
        Requirements {
            require_clean_finish: true,
            min_duration_minutes: Some(15),
            ..Requirements::default()
        }
    }

    fn with_duration(mut s: Participation, minutes: i64) -> Participation {
        let start = s.created_at;
        s.started_at = Some(start);
        s.finished_at = Some(start + Duration::minutes(minutes));
        s
    }

    #[test]
    fn clean_finish_satisfied() {
        let ev = event();
        let s = with_duration(session(&ev), 20);
        let result = evaluate_requirements(&clean_sprint(), &s, &ev, Some(Tier::E2));
        assert!(result.satisfied);
        assert!(result.reasons.is_empty());
    }

    #[test]
    fn single_incident_breaks_clean_finish() {
        let ev = event();
        let mut s = with_duration(session(&ev), 20);
        s.incidents = 1;
        let result = evaluate_requirements(&clean_sprint(), &s, &ev, Some(Tier::E2));
        assert!(!result.satisfied);
        assert_eq!(
            result.reasons,
            vec!["Clean finish required (no incidents or penalties)".to_string()]
        );
    }

    #[test]
    fn clean_finish_reports_both_sub_conditions() {
        let ev = event();
        let mut s = with_duration(session(&ev), 20);
        s.outcome = Some(OutcomeStatus::Dnf);
        s.penalties = 2;
        let result = evaluate_requirements(&clean_sprint(), &s, &ev, None);
        assert_eq!(
            result.reasons,
            vec![
                "Clean finish requires a finished result, got dnf".to_string(),
                "Clean finish required (no incidents or penalties)".to_string(),
            ]
        );
    }

    #[test]
    fn empty_requirements_accept_any_finished_session() {
        let ev = event();
        let mut s = session(&ev);
        s.incidents = 17;
        s.laps_completed = 0;
        s.finishing_position = None;
        let result = evaluate_requirements(&Requirements::default(), &s, &ev, None);
        assert!(result.satisfied);
    }

    #[rstest]
    #[case(OutcomeStatus::Dnf, false, false)]
    #[case(OutcomeStatus::Dsq, false, false)]
    #[case(OutcomeStatus::Dnf, true, true)]
    #[case(OutcomeStatus::Finished, false, true)]
    fn non_finish_gate(
        #[case] outcome: OutcomeStatus,
        #[case] allow_non_finish: bool,
        #[case] expected: bool,
    ) {
        let ev = event();
        let mut s = session(&ev);
        s.outcome = Some(outcome);
        let req = Requirements {
            allow_non_finish,
            ..Requirements::default()
        };
        assert_eq!(
            evaluate_requirements(&req, &s, &ev, None).satisfied,
            expected
        );
    }

    #[rstest]
    #[case(Some(Tier::E1), vec!["Event tier must be at least E2, got E1"])]
    #[case(None, vec!["Event tier must be at least E2, got unclassified"])]
    #[case(Some(Tier::E3), vec![])]
    fn minimum_tier(#[case] tier: Option<Tier>, #[case] expected: Vec<&str>) {
        let ev = event();
        let s = session(&ev);
        let req = Requirements {
            min_tier: Some(Tier::E2),
            ..Requirements::default()
        };
        assert_eq!(evaluate_requirements(&req, &s, &ev, tier).reasons, expected);
    }

    #[test]
    fn nominal_duration_used_without_timestamps() {
        let ev = event(); // nominal 40 minutes
        let s = session(&ev);
        let req = Requirements {
            min_duration_minutes: Some(45),
            ..Requirements::default()
        };
        assert_eq!(
            evaluate_requirements(&req, &s, &ev, None).reasons,
            vec!["Session must last at least 45 minutes, got 40"]
        );
    }

    #[test]
    fn collects_every_violation() {
        let ev = event();
        let mut s = session(&ev);
        s.incidents = 4;
        s.laps_completed = 3;
        s.finishing_position = Some(9);
        let req = Requirements {
            max_incidents: Some(2),
            require_night: true,
            require_team_event: true,
            max_position: Some(3),
            min_laps: Some(10),
            ..Requirements::default()
        };
        let result = evaluate_requirements(&req, &s, &ev, None);
        assert_eq!(
            result.reasons,
            vec![
                "At most 2 incidents allowed, got 4",
                "Night event required",
                "Team event required",
                "Finishing position must be P3 or better, got P9",
                "Minimum 10 laps required, got 3",
            ]
        );
    }
}
