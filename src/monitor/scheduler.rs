use std::future::Future;
use std::sync::{Mutex, MutexGuard};

use log::debug;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};

/// Holds the single "next check" task.
///
/// Arming always aborts the previous task first, so periodic checks and
/// post-chat resumptions can never pile up.
pub struct CheckScheduler {
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl CheckScheduler {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Runs `task` after `delay`, replacing whatever was scheduled before.
    pub fn schedule_after<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.slot();
        if let Some(previous) = slot.take() {
            previous.abort();
        }

        debug!("next check armed in {}ms", delay.as_millis());
        *slot = Some(tokio::spawn(async move {
            time::sleep(delay).await;
            task.await;
        }));
    }

    /// Aborts the pending task; returns whether one was still live.
    pub fn cancel_scheduled(&self) -> bool {
        match self.slot().take() {
            Some(handle) => {
                let live = !handle.is_finished();
                handle.abort();
                if live {
                    debug!("pending check cancelled");
                }
                live
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.slot()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Default for CheckScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CheckScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.slot().take() {
            handle.abort();
        }
    }
}
