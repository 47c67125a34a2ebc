//! Rules - 純粋な評価ロジック
//!
//! どれも副作用なし（入力 → 判定）。永続化や時刻の取得は app 層が担当します。
//!
//! - **requirements**: セッションがタスクの要件を満たすか
//! - **signature**: イベント設定の指紋（周回稼ぎの検出用）
//! - **scope**: スコープ別の構造的な可否（一意性・紐付け・クールダウン）
//! - **gates**: 繰り返し完了の制限（同一イベント・同一シグネチャ）
//! - **diminishing**: 逓減倍率
//! - **window**: rolling window の積み上げ

pub mod diminishing;
pub mod gates;
pub mod period;
pub mod rejection;
pub mod requirements;
pub mod scope;
pub mod signature;
pub mod window;

#[cfg(test)]
pub(crate) mod testing;

pub use diminishing::{DiminishingDefaults, multiplier, task_multiplier};
pub use gates::{Candidate, PastCompletion, check_repeat_gates, recent_count};
pub use period::period_key;
pub use rejection::Rejection;
pub use requirements::{Evaluation, evaluate, evaluate_requirements};
pub use scope::{Admission, can_complete, check_cooldown};
pub use signature::{SIGNATURE_VERSION, signature, stamp};
pub use window::{WindowStep, record_session};
