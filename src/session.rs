//! Session-scoped coordination flags shared by the dispatcher, the live
//! importer and the control channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::warn;

/// Coordination state for one session.
///
/// Cloning is cheap and every clone observes the same flags. Only the control
/// channel and the session driver write them; everything else reads.
#[derive(Debug, Clone)]
pub struct RunState {
    inner: Arc<Flags>,
}

#[derive(Debug)]
struct Flags {
    running: AtomicBool,
    paused: AtomicBool,
    stop_requested: AtomicBool,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    /// Fresh state: running, not paused, no stop requested.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Flags {
                running: AtomicBool::new(true),
                paused: AtomicBool::new(false),
                stop_requested: AtomicBool::new(false),
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    pub fn is_stop_requested(&self) -> bool {
        self.inner.stop_requested.load(Ordering::SeqCst)
    }

    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
    }

    /// Terminal: stops submissions and ends the session's polling loops.
    pub fn request_stop(&self) {
        self.inner.stop_requested.store(true, Ordering::SeqCst);
        self.inner.running.store(false, Ordering::SeqCst);
    }

    /// Marks the session as finished without signalling a stop.
    pub fn finish(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
    }

    /// Blocks while paused, polling every `interval`.
    ///
    /// Returns `false` if a stop was requested before or during the wait.
    pub async fn wait_while_paused(&self, interval: Duration) -> bool {
        while self.is_paused() && !self.is_stop_requested() {
            sleep(interval).await;
        }
        !self.is_stop_requested()
    }

    /// Sleeps for `total`, waking every `tick` to check for a stop.
    ///
    /// Returns `false` if the sleep was cut short by a stop request.
    pub async fn sleep_unless_stopped(&self, total: Duration, tick: Duration) -> bool {
        let mut remaining = total;
        while !remaining.is_zero() {
            if self.is_stop_requested() {
                return false;
            }
            let step = remaining.min(tick);
            sleep(step).await;
            remaining -= step;
        }
        !self.is_stop_requested()
    }
}

/// Requests a stop on `state` once `signal` resolves. In-flight jobs finish;
/// nothing new starts. A signal that resolves with an error is ignored.
pub fn stop_on<F>(signal: F, state: RunState) -> JoinHandle<()>
where
    F: Future<Output = std::io::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        match signal.await {
            Ok(()) => {
                warn!("interrupted; finishing in-flight jobs");
                state.request_stop();
            }
            Err(e) => warn!(error = %e, "interrupt listener failed"),
        }
    })
}
