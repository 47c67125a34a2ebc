//! Diminishing returns: score multiplier for repeated completions.

use crate::domain::RepeatPolicy;

/// Engine-wide fallbacks for tasks that do not declare step/floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiminishingDefaults {
    pub step: f64,
    pub floor: f64,
}

impl Default for DiminishingDefaults {
    fn default() -> Self {
        Self {
            step: 0.2,
            floor: 0.4,
        }
    }
}

/// `max(floor, 1.0 - step * recent)`, always within `[floor, 1.0]`.
///
/// Negative steps are treated as zero and the floor is clamped to `[0, 1]`.
pub fn multiplier(step: f64, floor: f64, recent: u32) -> f64 {
    let floor = floor.clamp(0.0, 1.0);
    let step = step.max(0.0);
    (1.0 - step * f64::from(recent)).clamp(floor, 1.0)
}

/// Multiplier for the task's next completion, given how many completions it
/// has inside its diversity window. Non-repeating tasks always get 1.0.
pub fn task_multiplier(policy: &RepeatPolicy, defaults: DiminishingDefaults, recent: u32) -> f64 {
    if !policy.applies_diminishing_returns() {
        return 1.0;
    }
    multiplier(
        policy.diminishing_step.unwrap_or(defaults.step),
        policy.diminishing_floor.unwrap_or(defaults.floor),
        recent,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 1.0)]
    #[case(1, 0.8)]
    #[case(2, 0.6)]
    #[case(3, 0.4)]
    #[case(10, 0.4)]
    fn default_curve(#[case] recent: u32, #[case] expected: f64) {
        let d = DiminishingDefaults::default();
        assert!((multiplier(d.step, d.floor, recent) - expected).abs() < 1e-9);
    }

    #[test]
    fn monotone_and_bounded() {
        for (step, floor) in [(0.2, 0.4), (0.05, 0.0), (0.5, 0.9), (1.5, 0.1)] {
            let mut previous = f64::INFINITY;
            for recent in 0..50 {
                let m = multiplier(step, floor, recent);
                assert!(m <= previous);
                assert!(m >= floor && m <= 1.0);
                previous = m;
            }
        }
    }

    #[test]
    fn only_repeating_tasks_decay() {
        let d = DiminishingDefaults::default();
        let mut policy = RepeatPolicy::default();
        assert_eq!(task_multiplier(&policy, d, 5), 1.0);

        policy.diminishing_returns = true;
        policy.diminishing_step = Some(0.1);
        assert!((task_multiplier(&policy, d, 2) - 0.8).abs() < 1e-9);
    }
}
