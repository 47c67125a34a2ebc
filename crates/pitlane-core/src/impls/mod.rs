//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryCompletionStore**: 一意制約つきの completion 保存先
//! - **InMemoryCatalog**: ドライバー・イベント・セッション・タスク定義
//!
//! 本番用の実装（PostgreSQL など）は別クレートに配置する想定です。

pub mod inmem_catalog;
pub mod inmem_store;

pub use self::inmem_catalog::InMemoryCatalog;
pub use self::inmem_store::InMemoryCompletionStore;
