//! Debounced scheduling for the detection calls.
//!
//! While a clinician is still typing, classification and subject-id
//! extraction should not fire on every keystroke. Each new input replaces
//! the previously scheduled action; only after the input has been quiet for
//! the full delay does the action run. Inputs below the detection minimum
//! cancel outright.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Quiet period before a scheduled detection fires.
pub const DETECTION_DEBOUNCE: Duration = Duration::from_millis(800);

/// Inputs shorter than this cancel the pending action instead of
/// rescheduling it. Matches the detection minimum.
pub const MIN_INPUT_LEN: usize = 10;

/// One-slot debounce timer. A new schedule aborts whatever was pending.
pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Schedule `action` to run after the quiet period, replacing any
    /// previously pending action.
    pub fn schedule<F>(&self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
        });

        let mut pending = self.lock_pending();
        if let Some(previous) = pending.replace(handle) {
            previous.abort();
        }
    }

    /// Drop the pending action without running it.
    pub fn cancel(&self) {
        if let Some(handle) = self.lock_pending().take() {
            handle.abort();
        }
    }

    /// Whether a scheduled action is still waiting to fire.
    pub fn is_pending(&self) -> bool {
        self.lock_pending()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// React to an input change: too-short input cancels, anything else
    /// restarts the quiet period with `action`.
    pub fn on_input<F>(&self, input: &str, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if input.trim().len() < MIN_INPUT_LEN {
            self.cancel();
        } else {
            self.schedule(action);
        }
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
