use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Returned by a tick to keep the timer going or end it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickFlow {
    Continue,
    Stop,
}

/// Periodic task tied to the lifetime of its handle. Dropping the handle
/// aborts the task, so a timer can never outlive the state that started it.
///
/// The first tick fires one period after spawning. Each tick is awaited before
/// the next one is scheduled and missed ticks are skipped, so one timer never
/// has two reads in flight.
pub struct ScopedTimer {
    label: &'static str,
    handle: JoinHandle<()>,
}

impl ScopedTimer {
    /// Must be called from within a tokio runtime
    pub fn spawn<F, Fut>(label: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = TickFlow> + Send + 'static,
    {
        log::debug!("Starting {} timer ({}ms)", label, period.as_millis());
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if tick().await == TickFlow::Stop {
                    log::debug!("{} timer finished", label);
                    break;
                }
            }
        });
        Self { label, handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        if !self.handle.is_finished() {
            log::debug!("Cancelling {} timer", self.label);
            self.handle.abort();
        }
    }
}
