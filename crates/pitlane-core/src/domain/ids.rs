//! Domain identifiers (strongly-typed IDs).
//!
//! ULID ベースの ID を Phantom type パターンで型付けしています。
//! `DriverId` と `ParticipationId` は同じ 128-bit 値でも混同できません。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"driver-", "session-" など）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// `T` は PhantomData で、実行時にはメモリを消費しません。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent, bound = "")]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    /// Fresh random id (tests and fixtures; production ids come from `IdGenerator`).
    pub fn random() -> Self {
        Self::from_ulid(Ulid::new())
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

impl<T: IdMarker> FromStr for Id<T> {
    type Err = ulid::DecodeError;

    /// Accepts both the bare ULID and the prefixed Display form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(T::prefix()).unwrap_or(s);
        Ulid::from_string(raw).map(Self::from_ulid)
    }
}

// ========================================
// マーカー型の定義
// ========================================

macro_rules! id_marker {
    ($marker:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $marker {}

        impl IdMarker for $marker {
            fn prefix() -> &'static str {
                $prefix
            }
        }
    };
}

id_marker!(Driver, "driver-");
id_marker!(Task, "task-");
id_marker!(Event, "event-");
id_marker!(Participation, "session-");
id_marker!(Completion, "completion-");

/// Identifier of a driver (owner of sessions and completions).
pub type DriverId = Id<Driver>;

/// Identifier of a task definition.
pub type TaskId = Id<Task>;

/// Identifier of an event (the rule configuration a session runs under).
pub type EventId = Id<Event>;

/// Identifier of a participation, i.e. one driver's racing session.
pub type ParticipationId = Id<Participation>;

/// Identifier of a task completion record.
pub type CompletionId = Id<Completion>;
