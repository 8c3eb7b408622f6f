//! Connectivity tracking with a transient "just reconnected" pulse.
//!
//! SYSTEM CONTEXT
//! ==============
//! The session monitor watches `NetworkState` to pause polling while offline
//! and to force one immediate re-validation on the reconnect pulse.

#[cfg(test)]
#[path = "network_test.rs"]
mod tests;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Observable connectivity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkState {
    pub online: bool,
    /// True only during the reconnect window after an offline→online transition.
    pub reconnecting: bool,
}

impl Default for NetworkState {
    fn default() -> Self {
        Self { online: true, reconnecting: false }
    }
}

/// Platform connectivity transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivitySignal {
    Online,
    Offline,
}

#[derive(Clone)]
pub struct NetworkMonitor {
    inner: Arc<NetworkInner>,
}

struct NetworkInner {
    tx: watch::Sender<NetworkState>,
    /// Bumped on every transition; a reset timer only applies if its epoch is still current.
    epoch: AtomicU64,
    reconnect_window: Duration,
}

impl NetworkMonitor {
    /// Start online, like a page that loaded successfully.
    #[must_use]
    pub fn new(reconnect_window: Duration) -> Self {
        Self::with_state(NetworkState::default(), reconnect_window)
    }

    #[must_use]
    pub fn with_state(initial: NetworkState, reconnect_window: Duration) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { inner: Arc::new(NetworkInner { tx, epoch: AtomicU64::new(0), reconnect_window }) }
    }

    #[must_use]
    pub fn state(&self) -> NetworkState {
        *self.inner.tx.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<NetworkState> {
        self.inner.tx.subscribe()
    }

    /// Apply one connectivity transition.
    ///
    /// `Online` while already online is ignored, so the reconnect pulse only
    /// fires after an intervening `Offline`. Must be called inside a tokio
    /// runtime: the pulse reset runs on a spawned timer.
    pub fn handle_signal(&self, signal: ConnectivitySignal) {
        match signal {
            ConnectivitySignal::Offline => {
                let changed = self.inner.tx.send_if_modified(|state| {
                    self.inner.epoch.fetch_add(1, Ordering::SeqCst);
                    let next = NetworkState { online: false, reconnecting: false };
                    std::mem::replace(state, next) != next
                });
                if changed {
                    tracing::info!("network offline");
                }
            }
            ConnectivitySignal::Online => {
                let mut epoch = None;
                self.inner.tx.send_if_modified(|state| {
                    if state.online {
                        return false;
                    }
                    *state = NetworkState { online: true, reconnecting: true };
                    epoch = Some(self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1);
                    true
                });
                if let Some(epoch) = epoch {
                    tracing::info!("network back online");
                    self.schedule_pulse_reset(epoch);
                }
            }
        }
    }

    fn schedule_pulse_reset(&self, epoch: u64) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(inner.reconnect_window).await;
            // Epoch is read and bumped only under the watch write lock.
            inner.tx.send_if_modified(|state| {
                if inner.epoch.load(Ordering::SeqCst) == epoch && state.reconnecting {
                    state.reconnecting = false;
                    true
                } else {
                    false
                }
            });
        });
    }

    /// Feed signals from a platform source until it closes.
    pub fn attach(&self, mut signals: mpsc::Receiver<ConnectivitySignal>) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                monitor.handle_signal(signal);
            }
            tracing::debug!("connectivity source closed");
        })
    }
}
