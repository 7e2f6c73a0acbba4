//! EventType - lifecycle event type names
//!
//! Task event types follow `sh.<namespace>.event.<task>.<kind>`, e.g.
//! `sh.keptn.event.deployment.triggered`. Sequence event types
//! (`sh.keptn.event.<stage>.<sequence>.<kind>`) are not task event types.
//!
//! # Key points
//! - Classification never panics; malformed input is simply "not a task type"
//! - `related_type` keeps the namespace of the triggered type

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Namespace used by the `*_type(task)` helpers.
pub const DEFAULT_NAMESPACE: &str = "keptn";

/// Type of the error-log event sent when an inbound event cannot be decoded.
pub const ERROR_LOG_EVENT_TYPE: &str = "sh.keptn.log.error";

const PREFIX: &str = "sh.";
const EVENT_SEGMENT: &str = "event";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventTypeError {
    #[error("'{0}' is not a task event type")]
    Malformed(String),

    #[error("'{0}' is not a triggered event type")]
    NotTriggered(String),
}

/// Lifecycle position of a task event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Triggered,
    Started,
    StatusChanged,
    Finished,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::Triggered,
        EventKind::Started,
        EventKind::StatusChanged,
        EventKind::Finished,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            EventKind::Triggered => "triggered",
            EventKind::Started => "started",
            EventKind::StatusChanged => "status.changed",
            EventKind::Finished => "finished",
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.suffix() == suffix)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// A parsed task event type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventType {
    namespace: String,
    task: String,
    kind: EventKind,
}

impl EventType {
    pub fn new(task: impl Into<String>, kind: EventKind) -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            task: task.into(),
            kind,
        }
    }

    /// Parses `sh.<namespace>.event.<task>.<kind>`.
    pub fn parse(raw: &str) -> Result<Self, EventTypeError> {
        let malformed = || EventTypeError::Malformed(raw.to_string());

        let rest = raw.strip_prefix(PREFIX).ok_or_else(malformed)?;
        let (namespace, rest) = rest.split_once('.').ok_or_else(malformed)?;
        let (segment, rest) = rest.split_once('.').ok_or_else(malformed)?;
        let (task, suffix) = rest.split_once('.').ok_or_else(malformed)?;

        if namespace.is_empty() || segment != EVENT_SEGMENT || task.is_empty() {
            return Err(malformed());
        }
        let kind = EventKind::from_suffix(suffix).ok_or_else(malformed)?;

        Ok(Self {
            namespace: namespace.to_string(),
            task: task.to_string(),
            kind,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn is_triggered(&self) -> bool {
        self.kind == EventKind::Triggered
    }

    /// Same namespace and task, different lifecycle position.
    pub fn with_kind(&self, kind: EventKind) -> Self {
        Self {
            namespace: self.namespace.clone(),
            task: self.task.clone(),
            kind,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{PREFIX}{}.{EVENT_SEGMENT}.{}.{}",
            self.namespace, self.task, self.kind
        )
    }
}

impl FromStr for EventType {
    type Err = EventTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

pub fn triggered_type(task: &str) -> String {
    EventType::new(task, EventKind::Triggered).to_string()
}

pub fn started_type(task: &str) -> String {
    EventType::new(task, EventKind::Started).to_string()
}

pub fn status_changed_type(task: &str) -> String {
    EventType::new(task, EventKind::StatusChanged).to_string()
}

pub fn finished_type(task: &str) -> String {
    EventType::new(task, EventKind::Finished).to_string()
}

pub fn is_task_event_type(event_type: &str) -> bool {
    EventType::parse(event_type).is_ok()
}

pub fn is_triggered_event_type(event_type: &str) -> bool {
    event_type.ends_with(".triggered")
}

/// Replaces the `.triggered` suffix of `triggered` with the suffix of `kind`.
pub fn related_type(triggered: &str, kind: EventKind) -> Result<String, EventTypeError> {
    let stem = triggered
        .strip_suffix(EventKind::Triggered.suffix())
        .filter(|stem| stem.ends_with('.'))
        .ok_or_else(|| EventTypeError::NotTriggered(triggered.to_string()))?;
    Ok(format!("{stem}{}", kind.suffix()))
}

/// Extracts the task name, e.g. `deployment` from `sh.keptn.event.deployment.finished`.
pub fn task_name(event_type: &str) -> Result<String, EventTypeError> {
    EventType::parse(event_type).map(|t| t.task)
}
