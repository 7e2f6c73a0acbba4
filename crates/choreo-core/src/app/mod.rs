//! App - application layer
//!
//! Wires the domain and ports into a runnable worker runtime.
//!
//! # Main components
//! - **RuntimeBuilder**: registration API and startup validation
//! - **Runtime**: `Integration` implementation, start / drain
//! - **Dispatcher**: per-event lifecycle (validate, filter, started, handler, finished)
//! - **EventFactory**: construction of outbound lifecycle events
//! - **ShutdownCoordinator**: cancellation, in-flight tracking, drain

pub mod builder;
pub mod context;
pub mod dispatcher;
pub mod factory;
pub mod handle;
pub mod runtime;
pub mod shutdown;
pub mod signals;

pub use self::builder::{BuildError, RuntimeBuilder};
pub use self::context::EventContext;
pub use self::dispatcher::{DispatchError, DispatchOutcome, Dispatcher};
pub use self::factory::{ConstructionError, EventFactory};
pub use self::handle::{HandleError, TaskHandle};
pub use self::runtime::Runtime;
pub use self::shutdown::{InflightGuard, ShutdownCoordinator, WaitCounter};
