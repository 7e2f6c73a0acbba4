//! TaskEvent - inbound / outbound lifecycle event
//!
//! # Key points
//! - `data` stays an opaque JSON value; `decode_data::<T>()` is the explicit decode
//! - `DecodedEvent` is a `TaskEvent` whose type and context fields were validated,
//!   which is what filters and handlers see

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use super::event_type::{EventType, EventTypeError};
use super::properties::EventProperties;

pub const CLOUD_EVENTS_SPEC_VERSION: &str = "1.0";
pub const DEFAULT_KEPTN_SPEC_VERSION: &str = "0.2.4";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// A lifecycle event with its correlation fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEvent {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default = "default_specversion")]
    pub specversion: String,
    #[serde(default = "default_content_type", alias = "contenttype")]
    pub datacontenttype: String,
    #[serde(default)]
    pub shkeptncontext: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggeredid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shkeptnspecversion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gitcommitid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data: Value,
}

fn default_specversion() -> String {
    CLOUD_EVENTS_SPEC_VERSION.to_string()
}

fn default_content_type() -> String {
    JSON_CONTENT_TYPE.to_string()
}

#[derive(Debug, Error)]
pub enum EventBuildError {
    #[error("event payload is missing {0}")]
    MissingContext(&'static str),

    #[error("event payload has no decodable context: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

impl TaskEvent {
    pub fn builder(event_type: impl Into<String>, data: Value) -> TaskEventBuilder {
        TaskEventBuilder::new(event_type, data)
    }

    pub fn event_type(&self) -> Option<&str> {
        self.event_type.as_deref()
    }

    /// Decodes the payload into a task specific type.
    pub fn decode_data<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }

    /// Outbound CloudEvents shape with the correlation fields as extensions.
    pub fn to_cloud_event(&self) -> Value {
        let mut extensions = json!({
            "shkeptncontext": self.shkeptncontext,
            "triggeredid": self.triggeredid.clone().unwrap_or_default(),
            "shkeptnspecversion": self
                .shkeptnspecversion
                .clone()
                .unwrap_or_else(|| DEFAULT_KEPTN_SPEC_VERSION.to_string()),
        });
        if let Some(commit) = &self.gitcommitid {
            extensions["gitcommitid"] = Value::String(commit.clone());
        }
        json!({
            "id": self.id,
            "type": self.event_type.clone().unwrap_or_default(),
            "source": self.source,
            "specversion": self.specversion,
            "datacontenttype": self.datacontenttype,
            "time": self.time,
            "extensions": extensions,
            "data": self.data,
        })
    }
}

/// Fluent construction of outbound events.
///
/// # Example
/// ```ignore
/// let event = TaskEvent::builder(triggered_type("deployment"), data)
///     .with_source("my-service")
///     .with_keptn_context(ctx)
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct TaskEventBuilder {
    event: TaskEvent,
}

impl TaskEventBuilder {
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event: TaskEvent {
                id: uuid::Uuid::new_v4().to_string(),
                event_type: Some(event_type.into()),
                source: String::new(),
                specversion: default_specversion(),
                datacontenttype: default_content_type(),
                shkeptncontext: String::new(),
                triggeredid: None,
                shkeptnspecversion: Some(DEFAULT_KEPTN_SPEC_VERSION.to_string()),
                gitcommitid: None,
                time: Some(Utc::now()),
                data,
            },
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.event.id = id.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.event.source = source.into();
        self
    }

    pub fn with_keptn_context(mut self, context: impl Into<String>) -> Self {
        self.event.shkeptncontext = context.into();
        self
    }

    pub fn with_triggered_id(mut self, triggered_id: impl Into<String>) -> Self {
        self.event.triggeredid = Some(triggered_id.into());
        self
    }

    pub fn with_spec_version(mut self, version: impl Into<String>) -> Self {
        self.event.shkeptnspecversion = Some(version.into());
        self
    }

    pub fn with_git_commit_id(mut self, commit: impl Into<String>) -> Self {
        self.event.gitcommitid = Some(commit.into());
        self
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.event.time = Some(time);
        self
    }

    /// Fails unless the payload names a project, stage and service.
    pub fn build(self) -> Result<TaskEvent, EventBuildError> {
        let properties = EventProperties::from_payload(&self.event.data)?;
        if properties.project.is_empty() {
            return Err(EventBuildError::MissingContext("project"));
        }
        if properties.stage.is_empty() {
            return Err(EventBuildError::MissingContext("stage"));
        }
        if properties.service.is_empty() {
            return Err(EventBuildError::MissingContext("service"));
        }
        Ok(self.event)
    }
}

/// Why an inbound event was rejected before reaching a handler.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("event {id} has no type")]
    MissingType { id: String },

    #[error(transparent)]
    InvalidType(#[from] EventTypeError),

    #[error("event {id} has an undecodable payload: {source}")]
    InvalidPayload {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A task event whose type parsed and whose context fields decoded.
#[derive(Debug, Clone)]
pub struct DecodedEvent {
    event: TaskEvent,
    event_type: EventType,
    properties: EventProperties,
}

impl DecodedEvent {
    pub fn decode(event: TaskEvent) -> Result<Self, DecodeError> {
        let raw_type = event.event_type().ok_or_else(|| DecodeError::MissingType {
            id: event.id.clone(),
        })?;
        let event_type = EventType::parse(raw_type)?;
        let properties =
            EventProperties::from_payload(&event.data).map_err(|source| {
                DecodeError::InvalidPayload {
                    id: event.id.clone(),
                    source,
                }
            })?;
        Ok(Self {
            event,
            event_type,
            properties,
        })
    }

    pub fn id(&self) -> &str {
        &self.event.id
    }

    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    pub fn task(&self) -> &str {
        self.event_type.task()
    }

    pub fn keptn_context(&self) -> &str {
        &self.event.shkeptncontext
    }

    pub fn properties(&self) -> &EventProperties {
        &self.properties
    }

    pub fn data(&self) -> &Value {
        &self.event.data
    }

    pub fn decode_data<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        self.event.decode_data()
    }

    pub fn event(&self) -> &TaskEvent {
        &self.event
    }

    pub fn into_event(self) -> TaskEvent {
        self.event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event_type::{EventKind, triggered_type};

    fn context() -> Value {
        json!({"project": "sockshop", "stage": "dev", "service": "carts"})
    }

    #[test]
    fn builder_requires_context() {
        let err = TaskEvent::builder(triggered_type("test"), json!({"project": "p"}))
            .build()
            .unwrap_err();
        assert!(matches!(err, EventBuildError::MissingContext("stage")));

        let now = Utc::now();
        let event = TaskEvent::builder(triggered_type("test"), context())
            .with_source("unit-test")
            .with_keptn_context("ctx-1")
            .with_id("id-1")
            .with_time(now)
            .build()
            .unwrap();
        assert_eq!(event.id, "id-1");
        assert_eq!(event.shkeptncontext, "ctx-1");
        assert_eq!(event.time, Some(now));
        assert_eq!(event.specversion, "1.0");
    }

    #[test]
    fn deserializes_control_plane_json() {
        let raw = json!({
            "id": "abc",
            "type": "sh.keptn.event.test.triggered",
            "source": "shipyard-controller",
            "specversion": "1.0",
            "contenttype": "application/json",
            "shkeptncontext": "ctx",
            "time": "2024-01-01T12:00:00Z",
            "data": {"project": "p"}
        });
        let event: TaskEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(event.event_type(), Some("sh.keptn.event.test.triggered"));
        assert_eq!(event.datacontenttype, "application/json");
        assert!(event.triggeredid.is_none());
    }

    #[test]
    fn cloud_event_shape_carries_extensions() {
        let event = TaskEvent::builder("sh.keptn.event.test.started", context())
            .with_source("svc")
            .with_keptn_context("ctx")
            .with_triggered_id("trig")
            .with_git_commit_id("abc123")
            .build()
            .unwrap();

        let wire = event.to_cloud_event();
        assert_eq!(wire["type"], "sh.keptn.event.test.started");
        assert_eq!(wire["datacontenttype"], "application/json");
        assert_eq!(wire["extensions"]["shkeptncontext"], "ctx");
        assert_eq!(wire["extensions"]["triggeredid"], "trig");
        assert_eq!(wire["extensions"]["shkeptnspecversion"], "0.2.4");
        assert_eq!(wire["extensions"]["gitcommitid"], "abc123");
        assert_eq!(wire["data"]["project"], "sockshop");
    }

    #[test]
    fn decode_validates_type_and_payload() {
        let mut event = TaskEvent::builder(triggered_type("test"), context())
            .build()
            .unwrap();
        let decoded = DecodedEvent::decode(event.clone()).unwrap();
        assert_eq!(decoded.task(), "test");
        assert_eq!(decoded.event_type().kind(), EventKind::Triggered);
        assert_eq!(decoded.properties().service, "carts");

        event.data = json!({"project": 42});
        assert!(matches!(
            DecodedEvent::decode(event.clone()),
            Err(DecodeError::InvalidPayload { .. })
        ));

        event.event_type = None;
        assert!(matches!(
            DecodedEvent::decode(event),
            Err(DecodeError::MissingType { .. })
        ));
    }

    #[test]
    fn decode_data_into_task_type() {
        #[derive(Deserialize)]
        struct Deployment {
            project: String,
            image: String,
        }

        let mut payload = context();
        payload["image"] = json!("carts:0.1");
        let event = TaskEvent::builder(triggered_type("deployment"), payload)
            .build()
            .unwrap();

        let decoded: Deployment = event.decode_data().unwrap();
        assert_eq!(decoded.project, "sockshop");
        assert_eq!(decoded.image, "carts:0.1");
    }
}
