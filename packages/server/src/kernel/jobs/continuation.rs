//! Re-arming the drain cycle.
//!
//! A cycle that leaves work behind asks a [`Continuation`] to run another
//! bounded cycle after a short delay. Scheduling is fire-and-forget: the
//! current cycle returns without waiting for the next one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::DrainScheduler;

pub trait Continuation: Send + Sync {
    fn schedule(&self, delay: Duration);
}

/// In-process continuation backed by a channel and a tokio timer.
///
/// Requests made while one is already armed are coalesced.
#[derive(Clone)]
pub struct TokioContinuation {
    tx: mpsc::UnboundedSender<Duration>,
    armed: Arc<AtomicBool>,
}

/// Receiving half consumed by [`run_continuations`].
pub struct ContinuationReceiver {
    rx: mpsc::UnboundedReceiver<Duration>,
    armed: Arc<AtomicBool>,
}

impl TokioContinuation {
    pub fn channel() -> (Self, ContinuationReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let armed = Arc::new(AtomicBool::new(false));
        (
            Self {
                tx,
                armed: armed.clone(),
            },
            ContinuationReceiver { rx, armed },
        )
    }
}

impl Continuation for TokioContinuation {
    fn schedule(&self, delay: Duration) {
        if self.armed.swap(true, Ordering::SeqCst) {
            debug!("Continuation already armed");
            return;
        }
        if self.tx.send(delay).is_err() {
            self.armed.store(false, Ordering::SeqCst);
            warn!("Continuation runner has stopped; cycle not re-armed");
        }
    }
}

/// Runs scheduled cycles until every sender is dropped.
pub async fn run_continuations(scheduler: Arc<DrainScheduler>, mut receiver: ContinuationReceiver) {
    while let Some(delay) = receiver.rx.recv().await {
        let scheduler = scheduler.clone();
        let armed = receiver.armed.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            armed.store(false, Ordering::SeqCst);
            match scheduler.run_cycle().await {
                Ok(report) => info!(
                    processed = report.processed,
                    failed = report.failed,
                    needs_more = report.needs_more,
                    "Continuation cycle finished"
                ),
                Err(e) => error!(error = %e, "Continuation cycle failed"),
            }
        });
    }
}

/// Re-arms by calling the drain endpoint of a deployed instance, for
/// platforms where nothing outlives the request.
pub struct HttpContinuation {
    client: reqwest::Client,
    drain_url: String,
}

impl HttpContinuation {
    pub fn new(public_base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            drain_url: format!("{}/api/queue/drain", public_base_url.trim_end_matches('/')),
        }
    }
}

impl Continuation for HttpContinuation {
    fn schedule(&self, delay: Duration) {
        let client = self.client.clone();
        let url = self.drain_url.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match client.post(&url).send().await {
                Ok(resp) if resp.status().is_success() => debug!(url = %url, "Continuation triggered"),
                Ok(resp) => warn!(url = %url, status = %resp.status(), "Continuation trigger rejected"),
                Err(e) => warn!(url = %url, error = %e, "Continuation trigger failed"),
            }
        });
    }
}

/// Never re-arms. Used by one-shot runs such as the CLI.
pub struct NoopContinuation;

impl Continuation for NoopContinuation {
    fn schedule(&self, delay: Duration) {
        debug!(?delay, "Continuation requested but disabled");
    }
}

/// Records requested delays for assertions.
#[derive(Default)]
pub struct RecordingContinuation {
    scheduled: Mutex<Vec<Duration>>,
}

impl RecordingContinuation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scheduled(&self) -> Vec<Duration> {
        self.scheduled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Continuation for RecordingContinuation {
    fn schedule(&self, delay: Duration) {
        self.scheduled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn armed_continuation_coalesces_requests() {
        let (continuation, mut receiver) = TokioContinuation::channel();
        continuation.schedule(Duration::from_secs(2));
        continuation.schedule(Duration::from_secs(2));

        assert_eq!(receiver.rx.recv().await, Some(Duration::from_secs(2)));
        assert!(receiver.rx.try_recv().is_err());
    }

    #[test]
    fn recording_continuation_keeps_delays() {
        let continuation = RecordingContinuation::new();
        continuation.schedule(Duration::from_millis(5));
        assert_eq!(continuation.scheduled(), vec![Duration::from_millis(5)]);
    }
}
