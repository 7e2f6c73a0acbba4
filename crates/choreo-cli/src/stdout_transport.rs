use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, Stdout};
use tokio::sync::Mutex;

use choreo_core::domain::{TaskEvent, TransportError};
use choreo_core::ports::Transport;

/// Writes each outbound event as one CloudEvents JSON line to stdout.
pub struct StdoutTransport {
    out: Mutex<Stdout>,
}

impl StdoutTransport {
    pub fn new() -> Self {
        Self {
            out: Mutex::new(tokio::io::stdout()),
        }
    }
}

#[async_trait]
impl Transport for StdoutTransport {
    async fn deliver(&self, event: &TaskEvent) -> Result<(), TransportError> {
        let mut line = serde_json::to_vec(&event.to_cloud_event())
            .map_err(|e| TransportError::with_source("could not encode event", e))?;
        line.push(b'\n');

        let mut out = self.out.lock().await;
        out.write_all(&line)
            .await
            .map_err(|e| TransportError::with_source("could not write to stdout", e))?;
        out.flush()
            .await
            .map_err(|e| TransportError::with_source("could not flush stdout", e))
    }
}
