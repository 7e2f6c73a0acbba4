//! FakeRuntime - unit-test harness for task handlers
//!
//! Dispatches synchronously into an `InMemoryEventSender`, so a test can push
//! an event and assert on what was emitted right after the call returns.

use std::sync::Arc;

use super::inmem_sender::InMemoryEventSender;
use crate::app::{Dispatcher, EventContext, EventFactory, WaitCounter};
use crate::domain::{ResultType, StatusType, TaskEvent};
use crate::ports::SequentialIdGenerator;
use crate::typed::{TaskHandler, TaskHandlerOptions, TaskRegistry};

/// FakeRuntime registers handlers and records every event they cause
///
/// # Example
/// ```ignore
/// let mut fake = FakeRuntime::new("my-service");
/// fake.add_task_handler(triggered_type("deployment"), DeployHandler, TaskHandlerOptions::default());
/// fake.new_event(deployment_triggered()).await;
///
/// fake.assert_number_of_events_sent(2);
/// fake.assert_sent_event_type(1, "sh.keptn.event.deployment.finished");
/// ```
pub struct FakeRuntime {
    registry: TaskRegistry,
    factory: EventFactory,
    automatic_response: bool,
    sender: Arc<InMemoryEventSender>,
    counter: WaitCounter,
}

impl FakeRuntime {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            registry: TaskRegistry::new(),
            factory: EventFactory::new(source)
                .with_id_generator(Arc::new(SequentialIdGenerator::new("fake-event"))),
            automatic_response: true,
            sender: Arc::new(InMemoryEventSender::new()),
            counter: WaitCounter::tracking(),
        }
    }

    pub fn with_automatic_response(mut self, enabled: bool) -> Self {
        self.automatic_response = enabled;
        self
    }

    pub fn add_task_handler<H: TaskHandler + 'static>(
        &mut self,
        event_type: impl Into<String>,
        handler: H,
        options: TaskHandlerOptions,
    ) {
        self.registry.register(event_type, Arc::new(handler), options);
    }

    /// Dispatches `event`; returns once every emitted event was recorded.
    pub async fn new_event(&self, event: TaskEvent) {
        let dispatcher = Dispatcher::new(
            self.registry.clone(),
            self.factory.clone(),
            self.automatic_response,
            true,
        );
        let ctx = EventContext::default()
            .with_sender(self.sender.clone())
            .with_wait_counter(self.counter.clone())
            .with_integration_id("fake-integration");
        dispatcher.on_event(&ctx, event).await;
    }

    pub fn sender(&self) -> &Arc<InMemoryEventSender> {
        &self.sender
    }

    pub fn sent_events(&self) -> Vec<TaskEvent> {
        self.sender.events()
    }

    pub fn in_flight(&self) -> usize {
        self.counter.in_flight()
    }

    pub fn assert_number_of_events_sent(&self, expected: usize) {
        let sent = self.sender.event_types();
        assert_eq!(sent.len(), expected, "unexpected events sent: {sent:?}");
    }

    pub fn assert_sent_event_type(&self, index: usize, expected: &str) {
        let event = self.sent_event(index);
        assert_eq!(event.event_type(), Some(expected), "event #{index}");
    }

    pub fn assert_sent_event_status(&self, index: usize, expected: StatusType) {
        let event = self.sent_event(index);
        let status: Option<StatusType> = event
            .data
            .get("status")
            .and_then(|s| serde_json::from_value(s.clone()).ok());
        assert_eq!(status, Some(expected), "status of event #{index}");
    }

    pub fn assert_sent_event_result(&self, index: usize, expected: ResultType) {
        let event = self.sent_event(index);
        let result: Option<ResultType> = event
            .data
            .get("result")
            .and_then(|r| serde_json::from_value(r.clone()).ok());
        assert_eq!(result, Some(expected), "result of event #{index}");
    }

    fn sent_event(&self, index: usize) -> TaskEvent {
        let events = self.sender.events();
        match events.get(index) {
            Some(event) => event.clone(),
            None => panic!("event #{index} was not sent, only {} were", events.len()),
        }
    }
}
