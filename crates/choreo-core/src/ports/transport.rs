//! Transport port - one delivery try of an outbound event
//!
//! The broker protocol lives behind this trait. Retrying is layered on top
//! by `impls::RetryingSender`.

use async_trait::async_trait;

use crate::domain::{TaskEvent, TransportError};

#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, event: &TaskEvent) -> Result<(), TransportError>;
}
