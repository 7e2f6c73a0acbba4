//! choreo-core
//!
//! Worker runtime for choreography-style workflow engines: task handlers are
//! registered per event type, `.triggered` events are dispatched to them and
//! the `.started` / `.finished` lifecycle events are emitted on their behalf.
//!
//! # Modules
//! - **domain**: event types, context properties, events, errors
//! - **ports**: event bus, control plane, clock, id generation
//! - **app**: builder, runtime, dispatcher, shutdown
//! - **typed**: handler traits and the task registry
//! - **impls**: retrying sender, in-memory sender and control plane, test harness
//! - **config**: runtime options and deployment environment

pub mod domain;
pub mod ports;
pub mod app;
pub mod typed;
pub mod impls;
pub mod config;

pub use crate::app::{Runtime, RuntimeBuilder, TaskHandle};
pub use crate::config::{EnvConfig, RuntimeConfig};
pub use crate::domain::{DecodedEvent, TaskError, TaskEvent};
pub use crate::typed::{Handler, TaskData, TaskHandler, TaskHandlerOptions, TaskResult};
