//! EventFactory - builds the events a worker emits
//!
//! Every lifecycle event answers a `.triggered` event:
//! - new id, worker source, `triggeredid` = parent id
//! - `shkeptncontext` (and git commit id) copied from the parent
//! - project / stage / service / labels merged from the parent payload

use std::sync::Arc;

use serde_json::{Value, json};
use thiserror::Error;

use crate::domain::event::DEFAULT_KEPTN_SPEC_VERSION;
use crate::domain::event_type::ERROR_LOG_EVENT_TYPE;
use crate::domain::properties::merge_into_payload;
use crate::domain::{
    DecodedEvent, EventKind, EventTypeError, ResultType, StatusType, TaskError, TaskEvent,
    related_type,
};
use crate::ports::{Clock, IdGenerator, SystemClock, UuidGenerator};

#[derive(Debug, Error)]
pub enum ConstructionError {
    #[error(transparent)]
    EventType(#[from] EventTypeError),

    #[error("payload is not a JSON object: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct EventFactory {
    source: String,
    spec_version: String,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl EventFactory {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            spec_version: DEFAULT_KEPTN_SPEC_VERSION.to_string(),
            ids: Arc::new(UuidGenerator),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_spec_version(mut self, version: impl Into<String>) -> Self {
        self.spec_version = version.into();
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn started(&self, parent: &DecodedEvent) -> Result<TaskEvent, ConstructionError> {
        self.lifecycle(parent, EventKind::Started, Value::Null)
    }

    pub fn status_changed(
        &self,
        parent: &DecodedEvent,
        payload: Value,
    ) -> Result<TaskEvent, ConstructionError> {
        self.lifecycle(parent, EventKind::StatusChanged, payload)
    }

    /// `.finished` carrying `payload`; status and result default to
    /// `succeeded` / `pass` when the payload leaves them out.
    pub fn finished(
        &self,
        parent: &DecodedEvent,
        payload: Value,
    ) -> Result<TaskEvent, ConstructionError> {
        let mut event = self.lifecycle(parent, EventKind::Finished, payload)?;
        if let Value::Object(fields) = &mut event.data {
            fields
                .entry("status")
                .or_insert_with(|| json!(StatusType::Succeeded));
            fields
                .entry("result")
                .or_insert_with(|| json!(ResultType::Pass));
        }
        Ok(event)
    }

    /// `.finished` reporting a handler failure.
    pub fn error_finished(
        &self,
        parent: &DecodedEvent,
        error: &TaskError,
    ) -> Result<TaskEvent, ConstructionError> {
        let mut event =
            self.lifecycle(parent, EventKind::Finished, error.data.clone().unwrap_or_default())?;
        if let Value::Object(fields) = &mut event.data {
            fields.insert("status".to_string(), json!(error.reported_status()));
            fields.insert("result".to_string(), json!(error.result));
            fields.insert("message".to_string(), json!(error.message));
        }
        Ok(event)
    }

    /// `sh.keptn.log.error` for an event that never reached its handler.
    ///
    /// The raw event's context fields may be unreadable, so none are merged.
    pub fn error_log(&self, raw: &TaskEvent, integration_id: &str, message: &str) -> TaskEvent {
        let task = raw
            .event_type()
            .and_then(|t| crate::domain::event_type::task_name(t).ok())
            .unwrap_or_default();
        TaskEvent {
            id: self.ids.generate_event_id(),
            event_type: Some(ERROR_LOG_EVENT_TYPE.to_string()),
            source: self.source.clone(),
            specversion: raw.specversion.clone(),
            datacontenttype: raw.datacontenttype.clone(),
            shkeptncontext: raw.shkeptncontext.clone(),
            triggeredid: Some(raw.id.clone()),
            shkeptnspecversion: Some(self.spec_version_for(raw)),
            gitcommitid: raw.gitcommitid.clone(),
            time: Some(self.clock.now()),
            data: json!({
                "message": message,
                "integrationId": integration_id,
                "task": task,
            }),
        }
    }

    fn lifecycle(
        &self,
        parent: &DecodedEvent,
        kind: EventKind,
        payload: Value,
    ) -> Result<TaskEvent, ConstructionError> {
        let raw = parent.event();
        let event_type = related_type(raw.event_type().unwrap_or_default(), kind)?;
        let data = merge_into_payload(parent.properties(), payload)?;

        Ok(TaskEvent {
            id: self.ids.generate_event_id(),
            event_type: Some(event_type),
            source: self.source.clone(),
            specversion: raw.specversion.clone(),
            datacontenttype: raw.datacontenttype.clone(),
            shkeptncontext: raw.shkeptncontext.clone(),
            triggeredid: Some(raw.id.clone()),
            shkeptnspecversion: Some(self.spec_version_for(raw)),
            gitcommitid: raw.gitcommitid.clone(),
            time: Some(self.clock.now()),
            data,
        })
    }

    fn spec_version_for(&self, raw: &TaskEvent) -> String {
        raw.shkeptnspecversion
            .clone()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.spec_version.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SequentialIdGenerator};
    use chrono::{TimeZone, Utc};

    fn factory() -> EventFactory {
        EventFactory::new("my-service")
            .with_id_generator(Arc::new(SequentialIdGenerator::new("evt")))
            .with_clock(Arc::new(FixedClock::new(
                Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            )))
    }

    fn triggered() -> DecodedEvent {
        let event: TaskEvent = serde_json::from_value(json!({
            "id": "trigger-1",
            "type": "sh.keptn.event.deployment.triggered",
            "source": "shipyard-controller",
            "shkeptncontext": "ctx-1",
            "gitcommitid": "abc123",
            "data": {
                "project": "sockshop",
                "stage": "dev",
                "service": "carts",
                "labels": {"owner": "team-a"}
            }
        }))
        .unwrap();
        DecodedEvent::decode(event).unwrap()
    }

    #[test]
    fn started_event_correlates_with_parent() {
        let started = factory().started(&triggered()).unwrap();

        assert_eq!(started.id, "evt-1");
        assert_eq!(started.event_type(), Some("sh.keptn.event.deployment.started"));
        assert_eq!(started.source, "my-service");
        assert_eq!(started.shkeptncontext, "ctx-1");
        assert_eq!(started.triggeredid.as_deref(), Some("trigger-1"));
        assert_eq!(started.gitcommitid.as_deref(), Some("abc123"));
        assert_eq!(started.shkeptnspecversion.as_deref(), Some("0.2.4"));
        assert_eq!(started.data["project"], "sockshop");
        assert_eq!(started.data["labels"]["owner"], "team-a");
    }

    #[test]
    fn finished_defaults_status_and_result() {
        let finished = factory()
            .finished(&triggered(), json!({"deploymentURI": "http://carts"}))
            .unwrap();

        assert_eq!(finished.event_type(), Some("sh.keptn.event.deployment.finished"));
        assert_eq!(finished.data["status"], "succeeded");
        assert_eq!(finished.data["result"], "pass");
        assert_eq!(finished.data["deploymentURI"], "http://carts");
        assert_eq!(finished.data["service"], "carts");
    }

    #[test]
    fn finished_keeps_explicit_result() {
        let finished = factory()
            .finished(&triggered(), json!({"result": "warning"}))
            .unwrap();
        assert_eq!(finished.data["result"], "warning");
        assert_eq!(finished.data["status"], "succeeded");
    }

    #[test]
    fn error_finished_carries_failure() {
        let error = TaskError::errored("helm upgrade failed").with_data(json!({"attempt": 2}));
        let finished = factory().error_finished(&triggered(), &error).unwrap();

        assert_eq!(finished.data["status"], "errored");
        assert_eq!(finished.data["result"], "fail");
        assert_eq!(finished.data["message"], "helm upgrade failed");
        assert_eq!(finished.data["attempt"], 2);
        assert_eq!(finished.data["project"], "sockshop");
    }

    #[test]
    fn error_finished_never_reports_success() {
        let mut error = TaskError::errored("rejected");
        error.status = StatusType::Succeeded;
        let finished = factory().error_finished(&triggered(), &error).unwrap();

        assert_eq!(finished.data["status"], "errored");
        assert_eq!(finished.data["result"], "fail");
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let err = factory()
            .finished(&triggered(), json!(["not", "an", "object"]))
            .unwrap_err();
        assert!(matches!(err, ConstructionError::Payload(_)));
    }

    #[test]
    fn lifecycle_requires_triggered_parent() {
        let mut raw = triggered().into_event();
        raw.event_type = Some("sh.keptn.event.deployment.started".to_string());
        let parent = DecodedEvent::decode(raw).unwrap();

        assert!(matches!(
            factory().started(&parent),
            Err(ConstructionError::EventType(EventTypeError::NotTriggered(_)))
        ));
    }

    #[test]
    fn error_log_event_names_integration() {
        let raw = triggered().into_event();
        let log = factory().error_log(&raw, "integration-7", "could not decode");

        assert_eq!(log.event_type(), Some("sh.keptn.log.error"));
        assert_eq!(log.shkeptncontext, "ctx-1");
        assert_eq!(log.triggeredid.as_deref(), Some("trigger-1"));
        assert_eq!(log.data["integrationId"], "integration-7");
        assert_eq!(log.data["task"], "deployment");
        assert_eq!(log.data["message"], "could not decode");
    }
}
