//! ReadinessRegistry - イベントに紐付かないタスクの判定器
//!
//! コード → 判定器 の対応表。プロセス全体のシングルトンにはせず、
//! EngineBuilder 経由でエンジンに渡します。

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{Driver, TaskCompletion};

/// Decides whether a driver is ready for a non-event task.
///
/// `completed` holds every completed row of the driver across tasks.
pub trait ReadinessCheck: Send + Sync {
    fn is_ready(&self, driver: &Driver, completed: &[TaskCompletion]) -> bool;
}

impl<F> ReadinessCheck for F
where
    F: Fn(&Driver, &[TaskCompletion]) -> bool + Send + Sync,
{
    fn is_ready(&self, driver: &Driver, completed: &[TaskCompletion]) -> bool {
        self(driver, completed)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Readiness check for task '{0}' is already registered")]
    AlreadyRegistered(String),
}

#[derive(Default, Clone)]
pub struct ReadinessRegistry {
    checks: HashMap<String, Arc<dyn ReadinessCheck>>,
}

impl ReadinessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        task_code: impl Into<String>,
        check: impl ReadinessCheck + 'static,
    ) -> Result<(), RegistryError> {
        let task_code = task_code.into();
        if self.checks.contains_key(&task_code) {
            return Err(RegistryError::AlreadyRegistered(task_code));
        }
        self.checks.insert(task_code, Arc::new(check));
        Ok(())
    }

    pub fn get(&self, task_code: &str) -> Option<Arc<dyn ReadinessCheck>> {
        self.checks.get(task_code).cloned()
    }

    pub fn registered_codes(&self) -> Vec<String> {
        self.checks.keys().cloned().collect()
    }
}

impl std::fmt::Debug for ReadinessRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessRegistry")
            .field("codes", &self.registered_codes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Discipline, DriverId, Tier};

    fn driver(tier: Tier) -> Driver {
        Driver {
            id: DriverId::random(),
            discipline: Discipline::Gt,
            tier,
        }
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = ReadinessRegistry::new();
        registry
            .register("license_ready", |d: &Driver, _: &[TaskCompletion]| {
                d.tier >= Tier::E2
            })
            .unwrap();

        let check = registry.get("license_ready").unwrap();
        assert!(check.is_ready(&driver(Tier::E3), &[]));
        assert!(!check.is_ready(&driver(Tier::E1), &[]));
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_double_registration() {
        let mut registry = ReadinessRegistry::new();
        registry
            .register("license_ready", |_: &Driver, _: &[TaskCompletion]| true)
            .unwrap();
        let result = registry.register("license_ready", |_: &Driver, _: &[TaskCompletion]| false);
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(code)) if code == "license_ready"));
    }

    #[test]
    fn test_registered_codes() {
        let mut registry = ReadinessRegistry::new();
        registry
            .register("license_ready", |_: &Driver, _: &[TaskCompletion]| true)
            .unwrap();
        assert_eq!(registry.registered_codes(), vec!["license_ready".to_string()]);
    }
}
