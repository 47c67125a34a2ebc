//! Domain model: identifiers, collaborator records, task definitions and
//! completion records.

pub mod completion;
pub mod errors;
pub mod ids;
pub mod session;
pub mod task;
pub mod tier;

pub use completion::{CompletionStatus, SignatureStamp, TaskCompletion, WindowProgress};
pub use errors::{ConfigError, EngineError, StoreError};
pub use ids::{CompletionId, DriverId, EventId, ParticipationId, TaskId};
pub use session::{
    Driver, Event, EventFormat, EventRules, EventSource, LifecycleState, OutcomeStatus,
    Participation, ScheduleKind, SurfaceType, TrackType,
};
pub use task::{
    Period, RawTaskDefinition, RepeatPolicy, Requirements, Scope, TaskDefinition, WindowSpec,
    WindowUnit,
};
pub use tier::{Discipline, Tier};
