//! TaskRegistry - event type to handler mapping
//!
//! # Key points
//! - Type-erased trait objects in a HashMap
//! - Filled while building the runtime, read-only once the dispatcher owns it
//! - Re-registering an event type replaces the previous entry

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::{Handler, TaskHandler, TaskHandlerOptions, TypedHandler};
use super::task::TaskData;
use crate::domain::triggered_type;

/// A registered handler together with its options.
pub struct TaskEntry {
    pub event_type: String,
    pub handler: Arc<dyn TaskHandler>,
    pub options: TaskHandlerOptions,
}

impl std::fmt::Debug for TaskEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskEntry")
            .field("event_type", &self.event_type)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// TaskRegistry holds one entry per exact event type
///
/// # Example
/// ```ignore
/// let mut registry = TaskRegistry::new();
/// registry.register("sh.keptn.event.deployment.triggered", Arc::new(DeployHandler), options);
///
/// let entry = registry.lookup("sh.keptn.event.deployment.triggered");
/// ```
#[derive(Default, Debug, Clone)]
pub struct TaskRegistry {
    entries: HashMap<String, Arc<TaskEntry>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the entry for `event_type`, returning the replaced one.
    pub fn register(
        &mut self,
        event_type: impl Into<String>,
        handler: Arc<dyn TaskHandler>,
        options: TaskHandlerOptions,
    ) -> Option<Arc<TaskEntry>> {
        let event_type = event_type.into();
        let entry = TaskEntry {
            event_type: event_type.clone(),
            handler,
            options,
        };
        self.entries.insert(event_type, Arc::new(entry))
    }

    /// Registers `handler` for `<T::TASK>.triggered`.
    pub fn register_typed<T: TaskData, H: Handler<T> + 'static>(
        &mut self,
        handler: H,
        options: TaskHandlerOptions,
    ) -> Option<Arc<TaskEntry>> {
        self.register(
            triggered_type(T::TASK),
            Arc::new(TypedHandler::<T, H>::new(handler)),
            options,
        )
    }

    pub fn lookup(&self, event_type: &str) -> Option<Arc<TaskEntry>> {
        self.entries.get(event_type).cloned()
    }

    pub fn registered_types(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::TaskHandle;
    use crate::domain::DecodedEvent;
    use crate::typed::handler::TaskResult;
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;

    struct Fixed(&'static str);

    #[async_trait]
    impl TaskHandler for Fixed {
        async fn execute(&self, _: &TaskHandle, _: &DecodedEvent) -> TaskResult {
            Ok(Some(json!({ "by": self.0 })))
        }
    }

    #[derive(Deserialize)]
    struct Evaluation {}

    impl TaskData for Evaluation {
        const TASK: &'static str = "evaluation";
    }

    struct EvaluationHandler;

    #[async_trait]
    impl Handler<Evaluation> for EvaluationHandler {
        type Output = ();

        async fn handle(
            &self,
            _: &TaskHandle,
            _: &DecodedEvent,
            _: Evaluation,
        ) -> Result<Option<()>, crate::domain::TaskError> {
            Ok(None)
        }
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = TaskRegistry::new();
        registry.register(
            "sh.keptn.event.test.triggered",
            Arc::new(Fixed("a")),
            TaskHandlerOptions::default(),
        );

        let entry = registry.lookup("sh.keptn.event.test.triggered").unwrap();
        assert_eq!(entry.event_type, "sh.keptn.event.test.triggered");
        assert!(registry.lookup("sh.keptn.event.other.triggered").is_none());
        assert!(registry.lookup("sh.keptn.event.test.started").is_none());
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = TaskRegistry::new();
        let first = registry.register(
            "sh.keptn.event.test.triggered",
            Arc::new(Fixed("first")),
            TaskHandlerOptions::default(),
        );
        let replaced = registry.register(
            "sh.keptn.event.test.triggered",
            Arc::new(Fixed("second")),
            TaskHandlerOptions::new().skip_automatic_response(),
        );

        assert!(first.is_none());
        assert!(!replaced.unwrap().options.skip_automatic_response);
        assert_eq!(registry.len(), 1);
        assert!(
            registry
                .lookup("sh.keptn.event.test.triggered")
                .unwrap()
                .options
                .skip_automatic_response
        );
    }

    #[test]
    fn typed_registration_uses_triggered_type() {
        let mut registry = TaskRegistry::new();
        registry.register_typed::<Evaluation, _>(EvaluationHandler, TaskHandlerOptions::default());

        assert_eq!(
            registry.registered_types(),
            vec!["sh.keptn.event.evaluation.triggered".to_string()]
        );
    }
}
