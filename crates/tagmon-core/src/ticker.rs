//! Periodic background driver for store and registry updates.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use smol_str::SmolStr;
use tracing::debug;

use crate::error::TagError;

struct TickerShared {
    stopped: Mutex<bool>,
    cvar: Condvar,
}

/// Handle to a running ticker thread. Dropping the handle stops the
/// thread and waits for it to finish.
pub struct TickerHandle {
    shared: Arc<TickerShared>,
    join: Option<JoinHandle<()>>,
}

/// Spawns a named thread invoking a callback at a fixed interval.
pub struct Ticker;

impl Ticker {
    /// Start a ticker calling `tick` every `interval` until stopped.
    /// The first call happens immediately after spawn.
    pub fn spawn(
        name: &str,
        interval: Duration,
        mut tick: impl FnMut() + Send + 'static,
    ) -> Result<TickerHandle, TagError> {
        let shared = Arc::new(TickerShared {
            stopped: Mutex::new(false),
            cvar: Condvar::new(),
        });
        let thread_shared = Arc::clone(&shared);
        let join = std::thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || loop {
                tick();
                let guard = thread_shared
                    .stopped
                    .lock()
                    .expect("ticker stop flag poisoned");
                let (guard, _) = thread_shared
                    .cvar
                    .wait_timeout_while(guard, interval, |stopped| !*stopped)
                    .expect("ticker stop flag poisoned");
                if *guard {
                    break;
                }
            })
            .map_err(|err| TagError::ThreadSpawn(SmolStr::new(err.to_string())))?;
        debug!(name, ?interval, "ticker started");
        Ok(TickerHandle {
            shared,
            join: Some(join),
        })
    }
}

impl TickerHandle {
    /// Ask the ticker thread to stop after the current callback.
    pub fn stop(&self) {
        let mut stopped = self.shared.stopped.lock().expect("ticker stop flag poisoned");
        *stopped = true;
        self.shared.cvar.notify_all();
    }

    /// Stop the ticker and wait for the thread to finish.
    pub fn join(mut self) {
        self.stop();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        self.stop();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn ticker_runs_and_stops() {
        let counter = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&counter);
        let handle = Ticker::spawn("test-ticker", Duration::from_millis(5), move || {
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .expect("spawn");
        while counter.load(Ordering::SeqCst) < 3 {
            std::thread::sleep(Duration::from_millis(1));
        }
        handle.join();
        let after_join = counter.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(counter.load(Ordering::SeqCst), after_join);
    }
}
