mod greeting;
mod stdout_transport;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use choreo_core::domain::triggered_type;
use choreo_core::impls::{ChannelControlPlane, RetryingSender};
use choreo_core::{EnvConfig, RuntimeBuilder, RuntimeConfig, TaskEvent, TaskHandlerOptions};

use crate::greeting::{ECHO_TASK, EchoHandler, GREETING_TASK, GreetingHandler, GreetingTriggered};
use crate::stdout_transport::StdoutTransport;

/// Demo worker: reads CloudEvents (one JSON object per line) and writes the
/// lifecycle events it produces to stdout.
#[derive(Parser, Debug)]
#[command(name = "choreo", version, about)]
struct Args {
    /// Source name of this worker.
    #[arg(long, env = "CHOREO_SOURCE", default_value = "greetings-service")]
    source: String,

    /// File with one event per line; stdin when omitted.
    #[arg(long)]
    events: Option<PathBuf>,

    /// Name rendered into `{{.Name}}` by the greeting task.
    #[arg(long, default_value = "Keptn")]
    greet_name: String,

    /// Run handlers inline instead of in background tasks.
    #[arg(long)]
    sync: bool,

    #[arg(long)]
    no_auto_response: bool,

    #[arg(long)]
    no_graceful_shutdown: bool,

    /// Seconds to wait before draining in-flight events on shutdown.
    #[arg(long)]
    grace_secs: Option<u64>,

    /// Channel capacity between the reader and the runtime.
    #[arg(long, default_value_t = 64)]
    capacity: usize,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    // stdout carries the emitted events
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn runtime_config(args: &Args) -> Result<RuntimeConfig> {
    let mut config = RuntimeConfig::from_env().context("invalid runtime configuration")?;
    if args.sync {
        config.sync_processing = true;
    }
    if args.no_auto_response {
        config.automatic_event_response = false;
    }
    if args.no_graceful_shutdown {
        config.graceful_shutdown = false;
    }
    if let Some(secs) = args.grace_secs {
        config.shutdown_grace_period = Duration::from_secs(secs);
    }
    Ok(config)
}

/// Forwards parsed lines until EOF or shutdown; dropping `feed` closes the subscription.
async fn feed_events<R>(
    input: R,
    feed: mpsc::Sender<TaskEvent>,
    shutdown: CancellationToken,
) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut forwarded = 0;

    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line.context("could not read event input")?,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<TaskEvent>(&line) {
            Ok(event) => {
                if feed.send(event).await.is_err() {
                    break;
                }
                forwarded += 1;
            }
            Err(e) => warn!(error = %e, "skipping line that is not an event"),
        }
    }
    Ok(forwarded)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = runtime_config(&args)?;
    let retry = config.retry.clone();
    let expected = [triggered_type(GREETING_TASK), triggered_type(ECHO_TASK)];
    let expected: Vec<&str> = expected.iter().map(String::as_str).collect();

    let runtime = RuntimeBuilder::new(args.source.clone())
        .with_config(config)
        .with_env(EnvConfig::from_env())
        .register::<GreetingTriggered, _>(GreetingHandler::new(args.greet_name.clone()))
        .with_task_event_handler(
            triggered_type(ECHO_TASK),
            EchoHandler,
            TaskHandlerOptions::new().skip_automatic_response(),
        )
        .expect_tasks(&expected)
        .build()
        .context("could not build runtime")?;

    let sender = Arc::new(RetryingSender::with_policy(StdoutTransport::new(), retry));
    let (control_plane, feed) = ChannelControlPlane::new(sender, args.capacity);

    let shutdown = runtime.shutdown_token();
    let reader = match &args.events {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("could not open {}", path.display()))?;
            tokio::spawn(feed_events(BufReader::new(file), feed, shutdown))
        }
        None => tokio::spawn(feed_events(BufReader::new(tokio::io::stdin()), feed, shutdown)),
    };

    runtime
        .start(&control_plane)
        .await
        .context("control plane stopped with an error")?;

    let forwarded = reader.await.context("event reader panicked")??;
    info!(forwarded, "done");
    Ok(())
}
