//! Task definitions: requirement set, repeat policy and completion scope.
//!
//! Definitions arrive in a loose, JSON-friendly shape (`RawTaskDefinition`)
//! where any requirement may sit either in a typed field or in the generic
//! `requirements` bag. Conversion into `TaskDefinition` happens once, at load
//! time; typed fields shadow bag entries. After that the engine only sees the
//! typed form.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::errors::ConfigError;
use super::ids::TaskId;
use super::tier::{Discipline, Tier};

/// Period granularity of a `periodic` task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
}

impl Period {
    fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" => Ok(Period::Daily),
            "weekly" | "week" => Ok(Period::Weekly),
            "monthly" | "month" => Ok(Period::Monthly),
            other => Err(ConfigError::UnknownPeriod(other.to_string())),
        }
    }
}

/// How qualifying sessions are counted toward a rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowUnit {
    /// Consecutive qualifying sessions; a non-qualifying one resets the streak.
    Sessions,
    /// Qualifying sessions counted at most once per calendar day, no reset.
    Days,
}

impl WindowUnit {
    fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sessions" | "session" | "participations" => Ok(WindowUnit::Sessions),
            "days" | "day" => Ok(WindowUnit::Days),
            other => Err(ConfigError::UnknownWindowUnit(other.to_string())),
        }
    }
}

/// Rolling-window parameters. `size` falls back to the engine default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub size: Option<u32>,
    pub unit: WindowUnit,
}

/// Uniqueness and linkage policy of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scope {
    /// One-time achievement; completion rows carry no participation.
    Global,
    /// Once per session; completion rows must carry the participation.
    PerParticipation,
    /// Once per calendar period.
    Periodic { period: Period },
    /// Achieved by accumulating qualifying sessions; once per lifetime.
    RollingWindow { window: WindowSpec },
}

impl Scope {
    pub fn name(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::PerParticipation => "per_participation",
            Scope::Periodic { .. } => "periodic",
            Scope::RollingWindow { .. } => "rolling_window",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Predicates a session must satisfy. `None` / `false` means no constraint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Requirements {
    pub min_tier: Option<Tier>,
    pub min_duration_minutes: Option<u32>,
    pub max_duration_minutes: Option<u32>,
    pub max_incidents: Option<u32>,
    pub max_penalties: Option<u32>,
    pub require_night: bool,
    pub require_dynamic_weather: bool,
    pub require_team_event: bool,
    /// Finished with zero incidents and zero penalties.
    pub require_clean_finish: bool,
    /// Accept dnf/dsq/dns results.
    pub allow_non_finish: bool,
    /// Finishing position must be at or behind this place.
    pub min_position: Option<u32>,
    /// Finishing position must be at or ahead of this place (e.g. 3 = podium).
    pub max_position: Option<u32>,
    pub min_laps: Option<u32>,
}

impl Requirements {
    pub fn is_empty(&self) -> bool {
        *self == Requirements::default()
    }
}

/// Parameters governing repeated completions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepeatPolicy {
    pub repeatable: bool,
    pub max_completions: Option<u32>,
    pub cooldown_hours: Option<u32>,
    pub diversity_window_days: Option<u32>,
    pub max_same_event_count: Option<u32>,
    pub require_event_diversity: Option<bool>,
    pub max_same_signature_count: Option<u32>,
    pub signature_cooldown_hours: Option<u32>,
    pub diminishing_returns: bool,
    pub diminishing_step: Option<f64>,
    pub diminishing_floor: Option<f64>,
}

impl RepeatPolicy {
    /// Cap on completions from the same event inside the diversity window.
    /// Repeatable tasks default to 1.
    pub fn same_event_cap(&self) -> Option<u32> {
        self.max_same_event_count
            .or(if self.repeatable { Some(1) } else { None })
    }

    /// Whether a repeat of the exact event signature inside the window is
    /// forbidden. Defaults to true for repeatable tasks.
    pub fn requires_event_diversity(&self) -> bool {
        self.require_event_diversity.unwrap_or(self.repeatable)
    }

    /// Whether completions carry a decaying multiplier.
    pub fn applies_diminishing_returns(&self) -> bool {
        self.repeatable || self.diminishing_returns
    }
}

/// A typed task definition. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub id: TaskId,
    pub code: String,
    pub name: String,
    pub discipline: Discipline,
    pub scope: Scope,
    pub active: bool,
    /// Whether completing the task requires a session at all.
    pub event_related: bool,
    pub requirements: Requirements,
    pub policy: RepeatPolicy,
}

/// Loose definition as stored or authored. Every requirement and policy key
/// may also appear in `requirements`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawTaskDefinition {
    pub id: Option<TaskId>,
    pub code: String,
    pub name: Option<String>,
    pub discipline: Option<Discipline>,
    pub scope: String,
    pub active: Option<bool>,
    pub event_related: Option<bool>,
    pub period: Option<String>,
    pub window_size: Option<u32>,
    pub window_unit: Option<String>,

    pub min_tier: Option<Tier>,
    pub min_duration_minutes: Option<u32>,
    pub max_duration_minutes: Option<u32>,
    pub max_incidents: Option<u32>,
    pub max_penalties: Option<u32>,
    pub require_night: Option<bool>,
    pub require_dynamic_weather: Option<bool>,
    pub require_team_event: Option<bool>,
    pub require_clean_finish: Option<bool>,
    pub allow_non_finish: Option<bool>,
    pub min_position: Option<u32>,
    pub max_position: Option<u32>,
    pub min_laps: Option<u32>,

    pub repeatable: Option<bool>,
    pub max_completions: Option<u32>,
    pub cooldown_hours: Option<u32>,
    pub diversity_window_days: Option<u32>,
    pub max_same_event_count: Option<u32>,
    pub require_event_diversity: Option<bool>,
    pub max_same_signature_count: Option<u32>,
    pub signature_cooldown_hours: Option<u32>,
    pub diminishing_returns: Option<bool>,
    pub diminishing_step: Option<f64>,
    pub diminishing_floor: Option<f64>,

    /// Generic requirement bag (legacy storage).
    pub requirements: Map<String, Value>,
}

/// Typed-field-or-bag lookup.
struct Bag<'a>(&'a Map<String, Value>);

impl Bag<'_> {
    fn u32(&self, typed: Option<u32>, key: &str) -> Result<Option<u32>, ConfigError> {
        if typed.is_some() {
            return Ok(typed);
        }
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| invalid(key, "expected a non-negative integer", v)),
        }
    }

    fn f64(&self, typed: Option<f64>, key: &str) -> Result<Option<f64>, ConfigError> {
        if typed.is_some() {
            return Ok(typed);
        }
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v
                .as_f64()
                .map(Some)
                .ok_or_else(|| invalid(key, "expected a number", v)),
        }
    }

    fn bool(&self, typed: Option<bool>, key: &str) -> Result<Option<bool>, ConfigError> {
        if typed.is_some() {
            return Ok(typed);
        }
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v
                .as_bool()
                .map(Some)
                .ok_or_else(|| invalid(key, "expected a boolean", v)),
        }
    }

    fn str(&self, typed: Option<String>, key: &str) -> Result<Option<String>, ConfigError> {
        if typed.is_some() {
            return Ok(typed);
        }
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(v) => Err(invalid(key, "expected a string", v)),
        }
    }
}

fn invalid(key: &str, message: &str, value: &Value) -> ConfigError {
    ConfigError::InvalidRequirement {
        key: key.to_string(),
        message: format!("{message}, got {value}"),
    }
}

impl RawTaskDefinition {
    fn parse_scope(&self, bag: &Bag<'_>) -> Result<Scope, ConfigError> {
        match self.scope.trim() {
            "global" => Ok(Scope::Global),
            "per_participation" => Ok(Scope::PerParticipation),
            "periodic" => {
                let period = bag
                    .str(self.period.clone(), "period")?
                    .ok_or(ConfigError::MissingPeriod)?;
                Ok(Scope::Periodic {
                    period: Period::parse(&period)?,
                })
            }
            "rolling_window" => {
                let unit = match bag.str(self.window_unit.clone(), "window_unit")? {
                    Some(u) => WindowUnit::parse(&u)?,
                    None => WindowUnit::Sessions,
                };
                Ok(Scope::RollingWindow {
                    window: WindowSpec {
                        size: bag.u32(self.window_size, "window_size")?,
                        unit,
                    },
                })
            }
            other => Err(ConfigError::UnknownScope(other.to_string())),
        }
    }
}

impl TryFrom<RawTaskDefinition> for TaskDefinition {
    type Error = ConfigError;

    fn try_from(raw: RawTaskDefinition) -> Result<Self, Self::Error> {
        let bag = Bag(&raw.requirements);
        let scope = raw.parse_scope(&bag)?;

        let min_tier = match raw.min_tier {
            Some(t) => Some(t),
            None => bag.str(None, "min_tier")?.map(|s| s.parse()).transpose()?,
        };

        let requirements = Requirements {
            min_tier,
            min_duration_minutes: bag.u32(raw.min_duration_minutes, "min_duration_minutes")?,
            max_duration_minutes: bag.u32(raw.max_duration_minutes, "max_duration_minutes")?,
            max_incidents: bag.u32(raw.max_incidents, "max_incidents")?,
            max_penalties: bag.u32(raw.max_penalties, "max_penalties")?,
            require_night: bag.bool(raw.require_night, "require_night")?.unwrap_or(false),
            require_dynamic_weather: bag
                .bool(raw.require_dynamic_weather, "require_dynamic_weather")?
                .unwrap_or(false),
            require_team_event: bag
                .bool(raw.require_team_event, "require_team_event")?
                .unwrap_or(false),
            require_clean_finish: bag
                .bool(raw.require_clean_finish, "require_clean_finish")?
                .unwrap_or(false),
            allow_non_finish: bag
                .bool(raw.allow_non_finish, "allow_non_finish")?
                .unwrap_or(false),
            min_position: bag.u32(raw.min_position, "min_position")?,
            max_position: bag.u32(raw.max_position, "max_position")?,
            min_laps: bag.u32(raw.min_laps, "min_laps")?,
        };

        let policy = RepeatPolicy {
            repeatable: bag.bool(raw.repeatable, "repeatable")?.unwrap_or(false),
            max_completions: bag.u32(raw.max_completions, "max_completions")?,
            cooldown_hours: bag.u32(raw.cooldown_hours, "cooldown_hours")?,
            diversity_window_days: bag.u32(raw.diversity_window_days, "diversity_window_days")?,
            max_same_event_count: bag.u32(raw.max_same_event_count, "max_same_event_count")?,
            require_event_diversity: bag
                .bool(raw.require_event_diversity, "require_event_diversity")?,
            max_same_signature_count: bag
                .u32(raw.max_same_signature_count, "max_same_signature_count")?,
            signature_cooldown_hours: bag
                .u32(raw.signature_cooldown_hours, "signature_cooldown_hours")?,
            diminishing_returns: bag
                .bool(raw.diminishing_returns, "diminishing_returns")?
                .unwrap_or(false),
            diminishing_step: bag.f64(raw.diminishing_step, "diminishing_step")?,
            diminishing_floor: bag.f64(raw.diminishing_floor, "diminishing_floor")?,
        };

        let discipline = raw.discipline.ok_or_else(|| ConfigError::InvalidRequirement {
            key: "discipline".to_string(),
            message: "missing".to_string(),
        })?;

        Ok(TaskDefinition {
            id: raw.id.unwrap_or_else(TaskId::random),
            name: raw.name.unwrap_or_else(|| raw.code.clone()),
            code: raw.code,
            discipline,
            scope,
            active: raw.active.unwrap_or(true),
            event_related: raw.event_related.unwrap_or(true),
            requirements,
            policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn raw(value: Value) -> RawTaskDefinition {
        serde_json::from_value(value).expect("raw definition")
    }

    #[test]
    fn typed_field_shadows_bag_entry() {
        let def = TaskDefinition::try_from(raw(json!({
            "code": "clean_sprint",
            "discipline": "gt",
            "scope": "per_participation",
            "min_duration_minutes": 15,
            "requirements": { "min_duration_minutes": 60, "max_incidents": 2 }
        })))
        .unwrap();

        assert_eq!(def.requirements.min_duration_minutes, Some(15));
        assert_eq!(def.requirements.max_incidents, Some(2));
    }

    #[test]
    fn bag_supplies_policy_and_tier() {
        let def = TaskDefinition::try_from(raw(json!({
            "code": "weekly_grind",
            "discipline": "formula",
            "scope": "periodic",
            "requirements": {
                "period": "weekly",
                "min_tier": "E2",
                "repeatable": true,
                "cooldown_hours": 12
            }
        })))
        .unwrap();

        assert_eq!(def.scope, Scope::Periodic { period: Period::Weekly });
        assert_eq!(def.requirements.min_tier, Some(Tier::E2));
        assert!(def.policy.repeatable);
        assert_eq!(def.policy.cooldown_hours, Some(12));
    }

    #[rstest]
    #[case(json!({"code": "x", "discipline": "gt", "scope": "seasonal"}), ConfigError::UnknownScope("seasonal".into()))]
    #[case(json!({"code": "x", "discipline": "gt", "scope": "periodic"}), ConfigError::MissingPeriod)]
    #[case(json!({"code": "x", "discipline": "gt", "scope": "periodic", "period": "hourly"}), ConfigError::UnknownPeriod("hourly".into()))]
    fn configuration_errors(#[case] value: Value, #[case] expected: ConfigError) {
        assert_eq!(TaskDefinition::try_from(raw(value)).unwrap_err(), expected);
    }

    #[test]
    fn malformed_bag_value_is_reported() {
        let err = TaskDefinition::try_from(raw(json!({
            "code": "x",
            "discipline": "gt",
            "scope": "global",
            "requirements": { "max_incidents": "few" }
        })))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRequirement { key, .. } if key == "max_incidents"));
    }

    #[test]
    fn rolling_window_defaults_to_session_streak() {
        let def = TaskDefinition::try_from(raw(json!({
            "code": "five_clean",
            "discipline": "karting",
            "scope": "rolling_window"
        })))
        .unwrap();
        assert_eq!(
            def.scope,
            Scope::RollingWindow {
                window: WindowSpec { size: None, unit: WindowUnit::Sessions }
            }
        );
        assert!(def.active);
        assert!(def.event_related);
        assert!(def.requirements.is_empty());
    }

    #[test]
    fn repeat_policy_defaults_follow_repeatable_flag() {
        let mut policy = RepeatPolicy::default();
        assert_eq!(policy.same_event_cap(), None);
        assert!(!policy.requires_event_diversity());
        assert!(!policy.applies_diminishing_returns());

        policy.repeatable = true;
        assert_eq!(policy.same_event_cap(), Some(1));
        assert!(policy.requires_event_diversity());
        assert!(policy.applies_diminishing_returns());

        policy.require_event_diversity = Some(false);
        assert!(!policy.requires_event_diversity());
    }
}
