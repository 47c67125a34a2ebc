//! EngineBuilder - エンジンの構築とワイヤリング
//!
//! # Fail-fast 設計
//! - expect_readiness() で判定器が必要なタスクコードを宣言
//! - build() 時に「期待集合 ⊆ 登録済み集合」をチェック
//! - 不足があれば BuildError を返す

use std::sync::Arc;

use super::config::EngineConfig;
use super::engine::CompletionEngine;
use super::readiness::{ReadinessCheck, ReadinessRegistry, RegistryError};
use crate::ports::{Catalog, Clock, CompletionStore, IdGenerator, SystemClock, UlidGenerator};

/// EngineBuilder は CompletionEngine を構築
///
/// # 使用例
/// ```ignore
/// let engine = EngineBuilder::new(store, catalog)
///     .clock(clock)
///     .readiness("license_ready", |d: &Driver, _: &[TaskCompletion]| d.tier >= Tier::E2)?
///     .expect_readiness(&["license_ready"])
///     .build()?;
/// ```
pub struct EngineBuilder {
    store: Arc<dyn CompletionStore>,
    catalog: Arc<dyn Catalog>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    config: EngineConfig,
    readiness: ReadinessRegistry,
    expected_readiness: Option<Vec<String>>,
}

/// BuildError はエンジン構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(
        "Missing readiness checks: {0:?}. These tasks were expected but not registered."
    )]
    MissingReadinessChecks(Vec<String>),
}

impl EngineBuilder {
    pub fn new(store: Arc<dyn CompletionStore>, catalog: Arc<dyn Catalog>) -> Self {
        Self {
            store,
            catalog,
            clock: None,
            ids: None,
            config: EngineConfig::default(),
            readiness: ReadinessRegistry::new(),
            expected_readiness: None,
        }
    }

    /// Defaults to the wall clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Defaults to ULIDs stamped with the engine clock.
    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Register the readiness check of a non-event task.
    pub fn readiness(
        mut self,
        task_code: impl Into<String>,
        check: impl ReadinessCheck + 'static,
    ) -> Result<Self, RegistryError> {
        self.readiness.register(task_code, check)?;
        Ok(self)
    }

    pub fn expect_readiness(mut self, task_codes: &[&str]) -> Self {
        self.expected_readiness = Some(task_codes.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn build(self) -> Result<CompletionEngine, BuildError> {
        if let Some(expected) = &self.expected_readiness {
            let registered = self.readiness.registered_codes();
            let missing: Vec<String> = expected
                .iter()
                .filter(|code| !registered.contains(code))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingReadinessChecks(missing));
            }
        }

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(clock.clone())) as Arc<dyn IdGenerator>);

        Ok(CompletionEngine::from_parts(
            self.store,
            self.catalog,
            clock,
            ids,
            self.config,
            self.readiness,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Driver, TaskCompletion};
    use crate::impls::{InMemoryCatalog, InMemoryCompletionStore};

    fn builder() -> EngineBuilder {
        EngineBuilder::new(
            Arc::new(InMemoryCompletionStore::new()),
            Arc::new(InMemoryCatalog::new()),
        )
    }

    fn always(_: &Driver, _: &[TaskCompletion]) -> bool {
        true
    }

    #[test]
    fn test_build_success() {
        let engine = builder()
            .readiness("license_ready", always)
            .unwrap()
            .expect_readiness(&["license_ready"])
            .build();
        assert!(engine.is_ok());
    }

    #[test]
    fn test_build_missing_readiness_checks() {
        let engine = builder()
            .readiness("license_ready", always)
            .unwrap()
            .expect_readiness(&["license_ready", "profile_complete"])
            .build();
        assert!(matches!(
            engine,
            Err(BuildError::MissingReadinessChecks(missing)) if missing == vec!["profile_complete".to_string()]
        ));
    }

    #[test]
    fn test_build_keeps_config() {
        let config = EngineConfig {
            default_window_size: 3,
            ..EngineConfig::default()
        };
        let engine = builder().config(config.clone()).build().unwrap();
        assert_eq!(engine.config(), &config);
    }
}
