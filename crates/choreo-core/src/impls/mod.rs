//! Impls - implementations of the ports
//!
//! # Included
//! - **RetryingSender**: `EventSender` over any `Transport`, with jittered backoff
//! - **InMemoryEventSender**: records events (development, tests)
//! - **ChannelControlPlane**: in-process control plane fed by a channel
//! - **FakeRuntime**: test harness for task handlers
//!
//! Broker-backed transports and control planes live outside this crate.

pub mod retry;
pub mod retrying_sender;
pub mod inmem_sender;
pub mod channel_control_plane;
pub mod fake;

pub use self::retry::RetryPolicy;
pub use self::retrying_sender::RetryingSender;
pub use self::inmem_sender::InMemoryEventSender;
pub use self::channel_control_plane::ChannelControlPlane;
pub use self::fake::FakeRuntime;
