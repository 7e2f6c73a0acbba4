//! Typed - handler registration API
//!
//! # Two layers
//! - **Typed**: `TaskData` trait, `Handler<T>` trait
//! - **Dyn**: `TaskHandler` trait, object-safe, what the registry stores

pub mod task;
pub mod handler;
pub mod registry;

pub use self::task::TaskData;
pub use self::handler::{
    EventFilter, Handler, TaskHandler, TaskHandlerOptions, TaskResult, TypedHandler, filter,
};
pub use self::registry::{TaskEntry, TaskRegistry};
