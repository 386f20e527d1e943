use std::time::Duration;
use tokio::task::JoinHandle;

/// A cancellable one-shot timer.
///
/// Dropping the timer cancels it. The callback runs synchronously on the
/// timer task once `delay` elapses, so it should only hand work off (e.g.
/// spawn a task) rather than await anything itself.
#[derive(Debug)]
pub struct DebounceTimer {
    ticket: u64,
    handle: JoinHandle<()>,
}

impl DebounceTimer {
    pub fn schedule<F>(delay: Duration, ticket: u64, on_expire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_expire();
        });
        Self { ticket, handle }
    }

    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
