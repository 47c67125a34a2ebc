//! EngineConfig - エンジン全体の既定値
//!
//! タスク定義が値を持たないときのフォールバックです。

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::domain::RepeatPolicy;
use crate::rules::DiminishingDefaults;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub default_diminishing_step: f64,
    pub default_diminishing_floor: f64,
    /// Qualifying sessions needed by a rolling-window task without `window_size`.
    pub default_window_size: u32,
    pub default_diversity_window_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let diminishing = DiminishingDefaults::default();
        Self {
            default_diminishing_step: diminishing.step,
            default_diminishing_floor: diminishing.floor,
            default_window_size: 5,
            default_diversity_window_days: 30,
        }
    }
}

impl EngineConfig {
    pub fn diminishing(&self) -> DiminishingDefaults {
        DiminishingDefaults {
            step: self.default_diminishing_step,
            floor: self.default_diminishing_floor,
        }
    }

    /// Diversity window of a task, falling back to the engine default.
    /// Saturates at `Duration::MAX`.
    pub fn diversity_window(&self, policy: &RepeatPolicy) -> Duration {
        let days = policy
            .diversity_window_days
            .unwrap_or(self.default_diversity_window_days);
        Duration::try_days(i64::from(days)).unwrap_or(Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "default_window_size": 3 }"#).unwrap();
        assert_eq!(config.default_window_size, 3);
        assert_eq!(config.default_diversity_window_days, 30);
        assert_eq!(config.diminishing(), DiminishingDefaults::default());
    }

    #[test]
    fn task_window_overrides_default() {
        let config = EngineConfig::default();
        let mut policy = RepeatPolicy::default();
        assert_eq!(config.diversity_window(&policy), Duration::days(30));

        policy.diversity_window_days = Some(7);
        assert_eq!(config.diversity_window(&policy), Duration::days(7));

        policy.diversity_window_days = Some(u32::MAX);
        assert!(config.diversity_window(&policy) >= Duration::days(365 * 10_000));
    }
}
