//! IdGenerator port - event id generation
//!
//! Outbound events get a fresh id; tests swap in a sequential generator to
//! make the ids predictable.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// IdGenerator produces ids for outbound events
///
/// # Thread Safety
/// - `Send + Sync` because dispatch units run on many tasks at once
pub trait IdGenerator: Send + Sync {
    fn generate_event_id(&self) -> String;
}

/// Random v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate_event_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// `<prefix>-1`, `<prefix>-2`, ...
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn generate_event_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{n}", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_generator_generates_unique_ids() {
        let id_gen = UuidGenerator;

        let id1 = id_gen.generate_event_id();
        let id2 = id_gen.generate_event_id();

        assert_ne!(id1, id2);
        assert!(Uuid::parse_str(&id1).is_ok());
    }

    #[test]
    fn sequential_generator_counts_up() {
        let id_gen = SequentialIdGenerator::new("evt");
        assert_eq!(id_gen.generate_event_id(), "evt-1");
        assert_eq!(id_gen.generate_event_id(), "evt-2");
    }
}
