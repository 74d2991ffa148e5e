//! Delayed application of committed settings to the radio.
//!
//! Reconfiguring the radio can drop the very connection that carries the
//! settings response, so commits arm a single-shot timer instead of applying
//! inline. Re-arming replaces the pending timer.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::ConfigState;
use crate::radio::Radio;

type Action = Arc<dyn Fn() + Send + Sync>;

/// Single-slot deferred apply timer.
pub struct DeferredApplier {
    action: Action,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl DeferredApplier {
    pub fn new(action: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            action: Arc::new(action),
            pending: Mutex::new(None),
        }
    }

    /// Applier that pushes the live bundle and its pending change flags to `radio`.
    pub fn for_radio(radio: Arc<dyn Radio>, config: Arc<ConfigState>) -> Self {
        Self::new(move || {
            let current = config.current();
            let changes = config.take_changes();
            info!(
                opmode = current.opmode.name(),
                ap_changed = changes.ap,
                sta_changed = changes.sta,
                "Applying WiFi settings"
            );
            if let Err(e) = radio.apply_settings(&current, changes) {
                error!(error = %e, "Failed to apply WiFi settings");
            }
        })
    }

    /// Run the action once after `delay`, replacing any pending run.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn arm(&self, delay: Duration) {
        let action = Arc::clone(&self.action);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action();
        });

        let previous = self.lock().replace(handle);
        if let Some(previous) = previous {
            previous.abort();
            debug!("Replaced pending settings apply");
        }
        debug!(delay_ms = delay.as_millis() as u64, "Settings apply armed");
    }

    /// Drop the pending run. Returns true if one was still waiting.
    pub fn cancel(&self) -> bool {
        match self.lock().take() {
            Some(handle) => {
                let waiting = !handle.is_finished();
                handle.abort();
                waiting
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.lock().as_ref().is_some_and(|h| !h.is_finished())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for DeferredApplier {
    fn drop(&mut self) {
        if let Some(handle) = self.lock().take() {
            handle.abort();
        }
    }
}
