//! Domain model (event types, context properties, events, errors).

pub mod event_type;
pub mod properties;
pub mod event;
pub mod errors;

pub use self::event_type::{
    EventKind, EventType, EventTypeError, finished_type, is_task_event_type,
    is_triggered_event_type, related_type, started_type, status_changed_type, triggered_type,
};
pub use self::properties::{EventData, EventProperties, ResultType, StatusType, merge_context};
pub use self::event::{DecodeError, DecodedEvent, EventBuildError, TaskEvent, TaskEventBuilder};
pub use self::errors::{SendError, TaskError, TransportError};
