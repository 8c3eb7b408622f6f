//! Background re-validation loop.
//!
//! Polls `bootstrap_validate` on a fixed period while online, and forces one
//! immediate validation whenever connectivity comes back, so staleness after
//! a connectivity gap is bounded by one round trip instead of one period.

#[cfg(test)]
#[path = "monitor_test.rs"]
mod tests;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::SessionManager;
use crate::config::MIN_VALIDATE_INTERVAL;

/// Handle to the running monitor task. Dropping it stops the task.
pub struct SessionMonitor {
    task: JoinHandle<()>,
}

impl SessionMonitor {
    pub fn stop(self) {
        self.task.abort();
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for SessionMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl SessionManager {
    /// Spawn the periodic/reconnect validation loop.
    #[must_use]
    pub fn spawn_monitor(&self) -> SessionMonitor {
        let manager = self.clone();
        let mut period = self.config().validate_interval;
        if period < MIN_VALIDATE_INTERVAL {
            tracing::warn!(?period, floor = ?MIN_VALIDATE_INTERVAL, "validate interval too short; using floor");
            period = MIN_VALIDATE_INTERVAL;
        }
        let task = tokio::spawn(async move {
            let mut network = manager.network().subscribe();
            let mut last_online = network.borrow_and_update().online;
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if manager.network().state().online {
                            tracing::debug!("periodic session validation");
                            manager.bootstrap_validate().await;
                        }
                    }
                    changed = network.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let state = *network.borrow_and_update();
                        // A pulse can be coalesced away while a validation runs,
                        // so an observed offline→online edge counts as well.
                        let reconnected = state.online && (state.reconnecting || !last_online);
                        last_online = state.online;
                        if reconnected {
                            tracing::info!("connectivity restored; re-validating session");
                            manager.bootstrap_validate().await;
                        }
                    }
                }
            }
        });
        SessionMonitor { task }
    }
}
