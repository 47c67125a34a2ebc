//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! エンジン本体は永続化の詳細を知らず、これらの trait だけに依存します。
//!
//! # 設計原則
//! - completion の正本は CompletionStore（一意制約の最後の砦）
//! - ドライバー・イベント・セッション・タスク定義は Catalog から読むだけ
//! - 時刻と ID は注入する（テストで決定的にするため）

pub mod catalog;
pub mod clock;
pub mod completion_store;
pub mod id_generator;

pub use self::catalog::Catalog;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::completion_store::CompletionStore;
pub use self::id_generator::{IdGenerator, UlidGenerator};
