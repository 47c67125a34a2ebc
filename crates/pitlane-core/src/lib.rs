//! pitlane-core
//!
//! Task completion & progression engine for racing sessions.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, tier, task, session, completion, errors）
//! - **rules**: 純粋な評価ロジック（requirements, signature, scope, gates, diminishing, window）
//! - **ports**: 抽象化レイヤー（CompletionStore, Catalog, Clock, IdGenerator）
//! - **impls**: 実装（InMemoryCompletionStore, InMemoryCatalog）
//! - **app**: オーケストレーション（EngineBuilder, CompletionEngine, ReadinessRegistry）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod rules;
