//! Graceful shutdown - in-flight tracking and drain
//!
//! - `WaitCounter` counts dispatch units that are still running
//! - `InflightGuard` releases its count on drop, on every exit path
//! - `ShutdownCoordinator` stops intake on cancellation, then drains

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::signals::wait_for_shutdown_signal;

#[derive(Debug, Default)]
struct Counter {
    in_flight: AtomicUsize,
    idle: Notify,
}

/// Counts in-flight dispatch units
///
/// The no-op variant is used when graceful shutdown is disabled: acquiring
/// is free and `wait` returns at once.
#[derive(Debug, Clone)]
pub struct WaitCounter {
    inner: Option<Arc<Counter>>,
}

impl WaitCounter {
    pub fn tracking() -> Self {
        Self {
            inner: Some(Arc::new(Counter::default())),
        }
    }

    pub fn noop() -> Self {
        Self { inner: None }
    }

    pub fn is_tracking(&self) -> bool {
        self.inner.is_some()
    }

    pub fn acquire(&self) -> InflightGuard {
        if let Some(counter) = &self.inner {
            counter.in_flight.fetch_add(1, Ordering::AcqRel);
        }
        InflightGuard {
            inner: self.inner.clone(),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.inner
            .as_ref()
            .map_or(0, |c| c.in_flight.load(Ordering::Acquire))
    }

    /// Resolves once nothing is in flight.
    pub async fn wait(&self) {
        let Some(counter) = &self.inner else {
            return;
        };
        loop {
            let idle = counter.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();
            if counter.in_flight.load(Ordering::Acquire) == 0 {
                return;
            }
            idle.await;
        }
    }
}

/// Holds one count of a `WaitCounter` until dropped.
#[derive(Debug)]
#[must_use = "the count is released as soon as the guard is dropped"]
pub struct InflightGuard {
    inner: Option<Arc<Counter>>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        if let Some(counter) = &self.inner {
            if counter.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
                counter.idle.notify_waiters();
            }
        }
    }
}

/// Owns the cancellation token and the wait counter of one runtime.
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    counter: WaitCounter,
    grace_period: Duration,
}

impl ShutdownCoordinator {
    pub fn new(graceful: bool, grace_period: Duration) -> Self {
        let counter = if graceful {
            WaitCounter::tracking()
        } else {
            WaitCounter::noop()
        };
        Self {
            token: CancellationToken::new(),
            counter,
            grace_period,
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn counter(&self) -> WaitCounter {
        self.counter.clone()
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Stops intake.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancels the token on SIGINT / SIGTERM / SIGQUIT.
    pub fn install_signal_handler(&self) -> JoinHandle<()> {
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                signal = wait_for_shutdown_signal() => match signal {
                    Ok(()) => {
                        info!("shutdown signal received, stopping intake");
                        token.cancel();
                    }
                    Err(err) => warn!(error = %err, "could not listen for shutdown signals"),
                },
            }
        })
    }

    /// Waits out the grace window, then for every in-flight unit to finish.
    ///
    /// The grace window lets events received just before cancellation
    /// acquire their count.
    pub async fn drain(&self) {
        if !self.counter.is_tracking() {
            return;
        }
        tokio::time::sleep(self.grace_period).await;
        let in_flight = self.counter.in_flight();
        if in_flight > 0 {
            info!(in_flight, "waiting for in-flight tasks to finish");
        }
        self.counter.wait().await;
        info!("all in-flight tasks finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test]
    async fn guard_releases_on_drop() {
        let counter = WaitCounter::tracking();
        let a = counter.acquire();
        let b = counter.acquire();
        assert_eq!(counter.in_flight(), 2);

        drop(a);
        assert_eq!(counter.in_flight(), 1);
        drop(b);
        assert_eq!(counter.in_flight(), 0);
        counter.wait().await;
    }

    #[tokio::test]
    async fn guard_releases_when_task_panics() {
        let counter = WaitCounter::tracking();
        let guard = counter.acquire();

        let joined = tokio::spawn(async move {
            let _guard = guard;
            panic!("handler blew up");
        })
        .await;

        assert!(joined.is_err());
        assert_eq!(counter.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_blocks_until_last_release() {
        let counter = WaitCounter::tracking();
        let guard = counter.acquire();

        let waiter = {
            let counter = counter.clone();
            tokio::spawn(async move { counter.wait().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn noop_counter_never_blocks() {
        let counter = WaitCounter::noop();
        let _guard = counter.acquire();
        assert_eq!(counter.in_flight(), 0);
        counter.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn drain_waits_for_grace_and_in_flight() {
        let shutdown = ShutdownCoordinator::new(true, Duration::from_secs(5));
        let guard = shutdown.counter().acquire();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(8)).await;
            drop(guard);
        });

        let start = Instant::now();
        shutdown.drain().await;
        assert!(start.elapsed() >= Duration::from_secs(8));
        assert_eq!(shutdown.counter().in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_is_immediate_without_graceful_shutdown() {
        let shutdown = ShutdownCoordinator::new(false, Duration::from_secs(5));
        let start = Instant::now();
        shutdown.drain().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn signal_handler_exits_on_cancel() {
        let shutdown = ShutdownCoordinator::new(true, Duration::ZERO);
        let handler = shutdown.install_signal_handler();
        shutdown.cancel();
        handler.await.unwrap();
        assert!(shutdown.token().is_cancelled());
    }
}
