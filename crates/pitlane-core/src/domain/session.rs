//! Collaborator records the engine reads: drivers, events and sessions
//! (participations).
//!
//! None of these are mutated by the engine. They are owned by the race
//! progression process and handed to us through the `Catalog` port.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{DriverId, EventId, ParticipationId};
use super::tier::{Discipline, Tier};

/// A driver, as far as the engine cares.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: DriverId,
    pub discipline: Discipline,
    pub tier: Tier,
}

/// Where an event came from (official calendar, user-hosted lobby, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Official,
    League,
    Community,
    Practice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventFormat {
    Sprint,
    Feature,
    Endurance,
    TimeTrial,
    Qualifying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    Scheduled,
    OnDemand,
    Recurring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackType {
    Road,
    Street,
    Oval,
    Rallycross,
    Stage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceType {
    Asphalt,
    Gravel,
    Dirt,
    Snow,
    Mixed,
}

/// Rule configuration of an event. Drives both requirement checks and the
/// session signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRules {
    pub source: EventSource,
    pub format: EventFormat,
    pub schedule: ScheduleKind,

    /// Nominal duration; used when a session has no measured duration.
    pub duration_minutes: u32,

    #[serde(default)]
    pub car_classes: Vec<String>,

    #[serde(default)]
    pub damage_enabled: bool,
    #[serde(default)]
    pub penalties_enabled: bool,
    #[serde(default)]
    pub fuel_consumption: bool,
    #[serde(default)]
    pub tire_wear: bool,
    #[serde(default)]
    pub dynamic_weather: bool,
    #[serde(default)]
    pub night: bool,
    #[serde(default)]
    pub team_event: bool,
    #[serde(default)]
    pub official: bool,

    pub track_type: TrackType,
    pub surface_type: SurfaceType,
}

/// An event: one rule configuration that many sessions can run under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,

    /// Display name; deliberately excluded from the signature.
    #[serde(default)]
    pub title: String,

    pub discipline: Discipline,

    /// Tier assigned by the external classifier, if classified.
    #[serde(default)]
    pub tier: Option<Tier>,

    /// Tasks explicitly attached to this event.
    #[serde(default)]
    pub task_codes: Vec<String>,

    pub rules: EventRules,
}

/// Lifecycle of a participation.
///
/// - Registered -> Started -> Completed
/// - Registered | Started -> Withdrawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Registered,
    Withdrawn,
    Started,
    Completed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Registered => "registered",
            LifecycleState::Withdrawn => "withdrawn",
            LifecycleState::Started => "started",
            LifecycleState::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Race result classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Finished,
    Dnf,
    Dsq,
    Dns,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutcomeStatus::Finished => "finished",
            OutcomeStatus::Dnf => "dnf",
            OutcomeStatus::Dsq => "dsq",
            OutcomeStatus::Dns => "dns",
        };
        f.write_str(s)
    }
}

/// One driver's session in one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participation {
    pub id: ParticipationId,
    pub driver_id: DriverId,
    pub event_id: EventId,
    pub state: LifecycleState,

    /// None until the session has a result.
    #[serde(default)]
    pub outcome: Option<OutcomeStatus>,

    #[serde(default)]
    pub incidents: u32,
    #[serde(default)]
    pub penalties: u32,
    #[serde(default)]
    pub laps_completed: u32,
    #[serde(default)]
    pub finishing_position: Option<u32>,

    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Participation {
    /// Measured duration in whole minutes, when both timestamps are known
    /// and ordered.
    pub fn measured_minutes(&self) -> Option<u32> {
        let (start, end) = (self.started_at?, self.finished_at?);
        let minutes = (end - start).num_minutes();
        u32::try_from(minutes).ok()
    }

    /// Measured duration, falling back to the event's nominal duration.
    pub fn duration_minutes(&self, event: &Event) -> u32 {
        self.measured_minutes()
            .unwrap_or(event.rules.duration_minutes)
    }

    /// Timestamp used to order this session in history windows.
    pub fn reference_time(&self) -> DateTime<Utc> {
        self.finished_at
            .or(self.started_at)
            .unwrap_or(self.created_at)
    }
}
