//! Ports - boundaries of the runtime
//!
//! Each trait hides a collaborator the runtime does not own: the event bus
//! (transport, sender, control plane), time and id generation.

pub mod clock;
pub mod id_generator;
pub mod transport;
pub mod event_sender;
pub mod control_plane;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, SequentialIdGenerator, UuidGenerator};
pub use self::transport::Transport;
pub use self::event_sender::EventSender;
pub use self::control_plane::{
    ControlPlane, ControlPlaneError, EventSubscription, Integration, IntegrationMetadata,
    KubernetesMetadata, RegistrationData,
};
