//! Monitor: poll one data category, publish what changed.
//!
//! # State machine
//!
//! ```text
//! Idle ──start──▶ Polling ──▶ Fetch ──▶ Diff ──▶ Publish ──▶ Sleep ─┐
//!                               ▲                                    │
//!                               └────────────────────────────────────┘
//!                 stop (checked between cycles) ──▶ Stopped
//! ```
//!
//! - The first successful fetch publishes every key, becomes the stored
//!   snapshot, and fires the one-shot [`Readiness`] signal.
//! - Later fetches are compared with the stored snapshot; only keys whose
//!   value changed are published.  Floats compare at one decimal, so
//!   `65.0 → 65.04` is not a change.
//! - A failed fetch is logged and skipped.  The stored snapshot is left as
//!   it was, so a flaky link never looks like values disappearing.
//! - A key whose publish fails keeps its previous stored value and is
//!   retried on the next cycle.
//!
//! Each monitor owns its snapshot; monitors share nothing except the
//! [`DeviceApi`] they poll through.
//!
//! # Why `watch` channels? (for beginners)
//!
//! A `tokio::sync::watch` channel holds one value that any number of
//! receivers can read or wait on.  Readiness is a `watch<bool>` that flips to
//! `true` once and never goes back, so a collaborator that subscribes late
//! still sees it.  Stopping uses a second `watch<bool>`: the loop checks it
//! between cycles and also wakes from its sleep when it changes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nbe_core::{Function, Payload, Value};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use crate::application::device::{DeviceApi, DeviceError};

/// Returned by a [`Publisher`] that could not deliver a change.
#[derive(Debug, Error)]
#[error("publish failed: {0}")]
pub struct PublishError(pub String);

/// Receives one notification per changed value.
///
/// The implementation owns topic naming and bus I/O.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, category: &str, key: &str, value: &Value) -> Result<(), PublishError>;
}

/// What a monitor polls and how often.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSpec {
    /// Category name attached to every publication.
    pub category: String,
    pub function: Function,
    pub path: String,
    pub interval: Duration,
}

impl MonitorSpec {
    /// Polls `category.*` with `GetSetup`.
    pub fn settings(category: &str, interval: Duration) -> Self {
        Self {
            category: category.to_string(),
            function: Function::GetSetup,
            path: format!("{category}.*"),
            interval,
        }
    }

    /// Polls live telemetry.
    pub fn operating(interval: Duration) -> Self {
        Self {
            category: "operating".to_string(),
            function: Function::GetOperatingData,
            path: "*".to_string(),
            interval,
        }
    }

    /// Polls extended telemetry.
    pub fn advanced(interval: Duration) -> Self {
        Self {
            category: "advanced".to_string(),
            function: Function::GetAdvancedData,
            path: "*".to_string(),
            interval,
        }
    }
}

/// One-shot signal that a monitor holds its first snapshot.
#[derive(Debug, Clone)]
pub struct Readiness {
    rx: watch::Receiver<bool>,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits until the first snapshot exists.
    ///
    /// Returns `false` if the monitor was dropped without ever becoming ready.
    pub async fn wait(&self) -> bool {
        let mut rx = self.rx.clone();
        let ready = rx.wait_for(|ready| *ready).await.is_ok();
        ready
    }
}

/// Keys of `current` whose value differs from `previous` (new keys included).
pub fn diff<'a>(previous: &Payload, current: &'a Payload) -> Vec<(&'a str, &'a Value)> {
    current
        .iter()
        .filter(|(key, value)| previous.get(*key) != Some(*value))
        .map(|(key, value)| (key.as_str(), value))
        .collect()
}

/// Polls one category and publishes changes.
pub struct Monitor {
    spec: MonitorSpec,
    device: Arc<dyn DeviceApi>,
    publisher: Arc<dyn Publisher>,
    state: Option<Payload>,
    ready: watch::Sender<bool>,
}

impl Monitor {
    pub fn new(spec: MonitorSpec, device: Arc<dyn DeviceApi>, publisher: Arc<dyn Publisher>) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            spec,
            device,
            publisher,
            state: None,
            ready,
        }
    }

    pub fn spec(&self) -> &MonitorSpec {
        &self.spec
    }

    /// The stored snapshot; `None` until the first successful fetch.
    pub fn state(&self) -> Option<&Payload> {
        self.state.as_ref()
    }

    pub fn readiness(&self) -> Readiness {
        Readiness {
            rx: self.ready.subscribe(),
        }
    }

    /// Runs one Fetch → Diff → Publish cycle and returns how many values were published.
    ///
    /// # Errors
    ///
    /// Returns the fetch error; the stored snapshot is unchanged in that case.
    pub async fn poll_once(&mut self) -> Result<usize, DeviceError> {
        let category = self.spec.category.as_str();
        let fetched = match self.device.get(self.spec.function, &self.spec.path).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(category, "fetch failed, keeping previous snapshot: {e}");
                return Err(e);
            }
        };

        let empty = Payload::new();
        let previous = self.state.as_ref().unwrap_or(&empty);
        let mut next = fetched.clone();
        let mut published = 0;

        for (key, value) in diff(previous, &fetched) {
            match self.publisher.publish(category, key, value).await {
                Ok(()) => published += 1,
                Err(e) => {
                    warn!(category, key, "publish failed, will retry next cycle: {e}");
                    match previous.get(key) {
                        Some(old) => next.insert(key.to_string(), old.clone()),
                        None => next.remove(key),
                    };
                }
            }
        }

        debug!(category, published, total = fetched.len(), "poll complete");
        self.state = Some(next);
        self.ready.send_if_modified(|ready| !std::mem::replace(ready, true));
        Ok(published)
    }

    /// Spawns the polling loop.
    pub fn start(self) -> MonitorHandle {
        let readiness = self.readiness();
        let category = self.spec.category.clone();
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(stop_rx));
        MonitorHandle {
            category,
            readiness,
            stop_tx,
            task,
        }
    }

    async fn run(mut self, mut stop_rx: watch::Receiver<bool>) {
        info!(
            category = %self.spec.category,
            interval_ms = self.spec.interval.as_millis() as u64,
            "monitor started"
        );
        loop {
            if *stop_rx.borrow() {
                break;
            }
            // Errors are logged inside; a failed cycle just waits for the next one.
            let _ = self.poll_once().await;

            tokio::select! {
                _ = time::sleep(self.spec.interval) => {}
                changed = stop_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!(category = %self.spec.category, "monitor stopped");
    }
}

/// A running monitor.
pub struct MonitorHandle {
    category: String,
    readiness: Readiness,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Asks the loop to stop at the next cycle boundary and waits for it.
    pub async fn stop(self) {
        self.stop_tx.send_replace(true);
        if let Err(e) = self.task.await {
            warn!(category = %self.category, "monitor task ended abnormally: {e}");
        }
    }
}
