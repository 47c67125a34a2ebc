//! App - アプリケーション層
//!
//! このモジュールは、ports と rules を組み合わせてオーケストレーションを実装します。
//!
//! # 主要コンポーネント
//! - **EngineBuilder**: エンジンの構築とワイヤリング
//! - **CompletionEngine**: 登録・完了・取り下げ時の completion 操作
//! - **ReadinessRegistry**: イベントに紐付かないタスクの判定器
//! - **EngineConfig**: 既定値
//! - **loader**: タスク定義の読み込み

pub mod builder;
pub mod config;
pub mod engine;
pub mod loader;
pub mod readiness;
pub mod report;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, EngineBuilder};
pub use self::config::EngineConfig;
pub use self::engine::CompletionEngine;
pub use self::loader::{LoadReport, load_definitions, load_definitions_from_values};
pub use self::readiness::{ReadinessCheck, ReadinessRegistry, RegistryError};
pub use self::report::{EvaluationReport, TaskOutcome, TaskReport};
