//! Round-robin pool of API credentials.
//!
//! Calls through one credential are serialized, and can be spaced by a
//! minimum interval for providers with a per-credential rate limit. On a
//! failure the caller classifies as rotatable, the next credential is tried;
//! each credential is tried at most once per call.

use anyhow::{bail, Result};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::warn;

struct Slot<C> {
    client: C,
    last_call: Mutex<Option<Instant>>,
}

pub struct CredentialPool<C> {
    slots: Vec<Slot<C>>,
    next: AtomicUsize,
    min_interval: Option<Duration>,
}

impl<C: Clone> CredentialPool<C> {
    pub fn new(clients: Vec<C>) -> Result<Self> {
        if clients.is_empty() {
            bail!("credential pool needs at least one client");
        }
        Ok(Self {
            slots: clients
                .into_iter()
                .map(|client| Slot {
                    client,
                    last_call: Mutex::new(None),
                })
                .collect(),
            next: AtomicUsize::new(0),
            min_interval: None,
        })
    }

    /// Space consecutive calls through one credential by at least `interval`.
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = Some(interval);
        self
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Runs `op` starting from the next credential in rotation.
    pub async fn with_rotation<T, E, F, Fut>(
        &self,
        mut op: F,
        should_rotate: impl Fn(&E) -> bool,
    ) -> std::result::Result<T, E>
    where
        F: FnMut(C) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: std::fmt::Display,
    {
        let len = self.slots.len();
        let start = self.next.fetch_add(1, Ordering::Relaxed) % len;
        let mut attempt = 0;
        loop {
            let index = (start + attempt) % len;
            let result = self.call(index, &mut op).await;
            attempt += 1;
            match result {
                Err(e) if attempt < len && should_rotate(&e) => {
                    warn!(credential = index, error = %e, "Rotating to next credential");
                }
                other => return other,
            }
        }
    }

    /// Like [`with_rotation`](Self::with_rotation), but no credential is
    /// tried after `deadline`. `op` receives the time left until then.
    pub async fn with_rotation_until<T, E, F, Fut>(
        &self,
        deadline: Instant,
        mut op: F,
        should_rotate: impl Fn(&E) -> bool,
    ) -> std::result::Result<T, E>
    where
        F: FnMut(C, Duration) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: std::fmt::Display,
    {
        self.with_rotation(
            |client| op(client, deadline.saturating_duration_since(Instant::now())),
            |e| Instant::now() < deadline && should_rotate(e),
        )
        .await
    }

    async fn call<T, E, F, Fut>(&self, index: usize, op: &mut F) -> std::result::Result<T, E>
    where
        F: FnMut(C) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let slot = &self.slots[index];
        let mut last_call = slot.last_call.lock().await;
        if let (Some(interval), Some(previous)) = (self.min_interval, *last_call) {
            let elapsed = previous.elapsed();
            if elapsed < interval {
                tokio::time::sleep(interval - elapsed).await;
            }
        }
        let result = op(slot.client.clone()).await;
        *last_call = Some(Instant::now());
        result
    }
}
