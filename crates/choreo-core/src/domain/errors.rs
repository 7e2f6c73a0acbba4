//! Errors - handler failures and delivery failures
//!
//! # Classification
//! - `TaskError`: a handler could not complete its task. Reported back as a
//!   `.finished` event, never fatal for the worker.
//! - `TransportError`: one delivery try failed.
//! - `SendError`: delivery gave up after its retries.

use serde_json::Value;
use thiserror::Error;

use super::properties::{ResultType, StatusType};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure returned by a task handler.
///
/// With automatic responses the status, result and message are copied into
/// the `.finished` event, merged over `data` when present. A failure is
/// reported as `errored` or `unknown`, never `succeeded`.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TaskError {
    pub status: StatusType,
    pub result: ResultType,
    pub message: String,
    pub data: Option<Value>,
    #[source]
    pub source: Option<BoxError>,
}

impl TaskError {
    /// A `succeeded` status is stored as `errored`.
    pub fn new(status: StatusType, result: ResultType, message: impl Into<String>) -> Self {
        Self {
            status: failure_status(status),
            result,
            message: message.into(),
            data: None,
            source: None,
        }
    }

    /// `errored` / `fail`, the usual outcome of a broken task.
    pub fn errored(message: impl Into<String>) -> Self {
        Self::new(StatusType::Errored, ResultType::Fail, message)
    }

    /// `unknown` / `fail`: the outcome of the task cannot be told.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(StatusType::Unknown, ResultType::Fail, message)
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Partial payload to report alongside the failure.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Status to put on the `.finished` event, even if `status` was set by hand.
    pub fn reported_status(&self) -> StatusType {
        failure_status(self.status)
    }
}

fn failure_status(status: StatusType) -> StatusType {
    match status {
        StatusType::Succeeded => StatusType::Errored,
        other => other,
    }
}

/// A single delivery try failed.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("event delivery failed after {attempts} attempts: {source}")]
    DeliveryFailed {
        attempts: u32,
        #[source]
        source: TransportError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn errored_defaults() {
        let err = TaskError::errored("deployment failed");
        assert_eq!(err.status, StatusType::Errored);
        assert_eq!(err.result, ResultType::Fail);
        assert_eq!(err.to_string(), "deployment failed");
        assert!(err.data.is_none());
    }

    #[test]
    fn failure_is_never_reported_as_succeeded() {
        let err = TaskError::new(StatusType::Succeeded, ResultType::Fail, "verdict negative");
        assert_eq!(err.status, StatusType::Errored);

        let mut err = TaskError::unknown("lost track");
        assert_eq!(err.reported_status(), StatusType::Unknown);
        err.status = StatusType::Succeeded;
        assert_eq!(err.reported_status(), StatusType::Errored);
    }

    #[test]
    fn task_error_keeps_its_source() {
        let io = std::io::Error::other("disk full");
        let err = TaskError::errored("could not write report").with_source(io);
        assert_eq!(err.source().map(|s| s.to_string()), Some("disk full".to_string()));
    }

    #[test]
    fn delivery_failure_reports_attempts() {
        let err = SendError::DeliveryFailed {
            attempts: 4,
            source: TransportError::new("connection refused"),
        };
        assert_eq!(
            err.to_string(),
            "event delivery failed after 4 attempts: connection refused"
        );
    }
}
