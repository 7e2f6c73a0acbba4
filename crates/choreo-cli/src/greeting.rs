use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use choreo_core::app::HandleError;
use choreo_core::domain::{EventData, EventProperties, StatusType, TaskError};
use choreo_core::{DecodedEvent, Handler, TaskData, TaskHandle, TaskHandler, TaskResult};

pub const GREETING_TASK: &str = "greeting";
pub const ECHO_TASK: &str = "echo";

/// Payload of `sh.keptn.event.greeting.triggered`.
#[derive(Debug, Deserialize)]
pub struct GreetingTriggered {
    #[serde(flatten)]
    pub context: EventProperties,
    #[serde(default)]
    pub text: String,
}

impl TaskData for GreetingTriggered {
    const TASK: &'static str = GREETING_TASK;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GreetingFinished {
    #[serde(flatten)]
    pub data: EventData,
    pub greet_message: String,
}

/// Renders the `text` of the triggered event, `{{.Name}}` being the only placeholder.
pub struct GreetingHandler {
    name: String,
}

impl GreetingHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn render(&self, text: &str) -> Result<String, TaskError> {
        if text.trim().is_empty() {
            return Err(TaskError::errored("greeting text is empty"));
        }
        Ok(text.replace("{{.Name}}", &self.name))
    }
}

#[async_trait]
impl Handler<GreetingTriggered> for GreetingHandler {
    type Output = GreetingFinished;

    async fn handle(
        &self,
        _: &TaskHandle,
        event: &DecodedEvent,
        task: GreetingTriggered,
    ) -> Result<Option<GreetingFinished>, TaskError> {
        let greet_message = self.render(&task.text)?;
        info!(event_id = %event.id(), %greet_message, "greeting rendered");

        Ok(Some(GreetingFinished {
            data: EventData {
                properties: task.context,
                ..EventData::default()
            },
            greet_message,
        }))
    }
}

/// Drives its own lifecycle: `.started`, one `.status.changed`, `.finished`.
pub struct EchoHandler;

#[async_trait]
impl TaskHandler for EchoHandler {
    async fn execute(&self, handle: &TaskHandle, event: &DecodedEvent) -> TaskResult {
        let lifecycle_error =
            |e: HandleError| TaskError::errored("could not send lifecycle event").with_source(e);
        info!(keptn_context = event.keptn_context(), "echoing event");

        handle
            .send_started_event(event)
            .await
            .map_err(lifecycle_error)?;
        handle
            .send_status_changed_event(event, json!({ "status": StatusType::Succeeded }))
            .await
            .map_err(lifecycle_error)?;
        handle
            .send_finished_event(event, json!({ "echo": event.data().clone() }))
            .await
            .map_err(lifecycle_error)?;

        // everything was sent already
        Ok(None)
    }
}
