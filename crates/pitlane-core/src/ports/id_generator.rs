//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use crate::domain::ids::CompletionId;
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は completion の ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数のリクエストハンドラから使える）
pub trait IdGenerator: Send + Sync {
    fn generate_completion_id(&self) -> CompletionId;
}

/// UlidGenerator は Clock の時刻をタイムスタンプ部に使う ULID 生成器
///
/// FixedClock を渡せば、タイムスタンプ部が決定的になります。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_completion_id(&self) -> CompletionId {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        CompletionId::from(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}
