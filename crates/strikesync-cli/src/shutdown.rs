use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::info;

/// Stop flag shared by the game loop, the Ctrl+C handler and the keyboard
/// monitor.
///
/// The game loop paces itself with [`ShutdownSignal::sleep_until`], so a quit
/// request wakes it at once instead of after the current tick sleep.
#[derive(Default)]
pub struct ShutdownSignal {
    stopped: Mutex<bool>,
    condvar: Condvar,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag and wake every waiter
    pub fn trigger(&self) {
        *self.lock() = true;
        self.condvar.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        *self.lock()
    }

    /// Sleep for `duration` unless shutdown comes first.
    ///
    /// Returns `true` if shutdown was triggered.
    pub fn wait(&self, duration: Duration) -> bool {
        self.sleep_until(Instant::now() + duration)
    }

    /// Sleep until `deadline` unless shutdown comes first.
    ///
    /// Returns `true` if shutdown was triggered. A deadline in the past
    /// returns immediately.
    pub fn sleep_until(&self, deadline: Instant) -> bool {
        let mut stopped = self.lock();
        while !*stopped {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            stopped = match self.condvar.wait_timeout(stopped, deadline - now) {
                Ok((guard, _)) => guard,
                // Poisoned: a holder panicked, treat as shutdown
                Err(_) => return true,
            };
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.stopped.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Trigger `shutdown` on Ctrl+C
pub fn install_ctrlc(shutdown: &Arc<ShutdownSignal>) -> Result<(), ctrlc::Error> {
    let shutdown = Arc::clone(shutdown);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal, stopping...");
        shutdown.trigger();
    })
}
