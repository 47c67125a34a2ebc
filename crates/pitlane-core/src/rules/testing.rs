//! Fixtures shared by the rule tests.

use chrono::{DateTime, TimeZone, Utc};

use crate::domain::{
    Discipline, DriverId, Event, EventFormat, EventId, EventRules, EventSource, LifecycleState,
    OutcomeStatus, Participation, ParticipationId, RepeatPolicy, Requirements, ScheduleKind,
    Scope, SurfaceType, TaskDefinition, TaskId, Tier, TrackType,
};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 19, 0, 0).unwrap()
}

/// Official 40 minute GT3 sprint, classified E2.
pub fn event() -> Event {
    Event {
        id: EventId::random(),
        title: "GT3 Sprint".to_string(),
        discipline: Discipline::Gt,
        tier: Some(Tier::E2),
        task_codes: vec![],
        rules: EventRules {
            source: EventSource::Official,
            format: EventFormat::Sprint,
            schedule: ScheduleKind::Scheduled,
            duration_minutes: 40,
            car_classes: vec!["GT3".to_string()],
            damage_enabled: true,
            penalties_enabled: true,
            fuel_consumption: true,
            tire_wear: true,
            dynamic_weather: false,
            night: false,
            team_event: false,
            official: true,
            track_type: TrackType::Road,
            surface_type: SurfaceType::Asphalt,
        },
    }
}

/// Clean, finished session in `event` without measured timestamps.
pub fn session(event: &Event) -> Participation {
    Participation {
        id: ParticipationId::random(),
        driver_id: DriverId::random(),
        event_id: event.id,
        state: LifecycleState::Completed,
        outcome: Some(OutcomeStatus::Finished),
        incidents: 0,
        penalties: 0,
        laps_completed: 18,
        finishing_position: Some(5),
        created_at: t0(),
        started_at: None,
        finished_at: None,
    }
}

pub fn task(scope: Scope) -> TaskDefinition {
    TaskDefinition {
        id: TaskId::random(),
        code: "test_task".to_string(),
        name: "Test task".to_string(),
        discipline: Discipline::Gt,
        scope,
        active: true,
        event_related: true,
        requirements: Requirements::default(),
        policy: RepeatPolicy::default(),
    }
}
