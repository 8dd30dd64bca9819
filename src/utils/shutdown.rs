//! Shutdown signalling - a thin wrapper around tokio's watch channel.
//!
//! A [`ShutdownTrigger`] flips the flag once; any number of [`Shutdown`] handles observe it.
//! If the trigger is dropped without firing, the handles simply never see a shutdown.
use std::time::Duration;

use tokio::sync::watch;

/// Creates a connected trigger and handle.
pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);

    (ShutdownTrigger(tx), Shutdown(rx))
}

/// Fires the shutdown.
#[derive(Debug)]
pub struct ShutdownTrigger(watch::Sender<bool>);

impl ShutdownTrigger {
    /// Requests shutdown. Firing more than once has no further effect.
    pub fn trigger(&self) {
        self.0.send_replace(true);
    }

    /// Another handle observing this trigger.
    pub fn subscribe(&self) -> Shutdown {
        Shutdown(self.0.subscribe())
    }
}

/// Observes a [`ShutdownTrigger`].
#[derive(Debug, Clone)]
pub struct Shutdown(watch::Receiver<bool>);

impl Shutdown {
    /// A handle whose trigger is already gone, so it never fires.
    pub fn never() -> Self {
        let (_, shutdown) = shutdown_channel();
        shutdown
    }

    /// Whether shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }

    /// Completes once shutdown is requested.
    pub async fn triggered(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }

            if self.0.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Sleeps for `duration` unless shutdown comes first.
    ///
    /// Returns `true` if shutdown was requested.
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.is_triggered(),
            _ = self.triggered() => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_runs_to_completion_without_trigger() {
        let (_trigger, mut shutdown) = shutdown_channel();
        let start = tokio::time::Instant::now();

        let triggered = shutdown.sleep(Duration::from_secs(5)).await;

        assert!(!triggered);
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_cuts_sleep_short() {
        let (trigger, mut shutdown) = shutdown_channel();
        let start = tokio::time::Instant::now();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.trigger();
        });

        let triggered = shutdown.sleep(Duration::from_secs(60)).await;

        assert!(triggered);
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_trigger_never_fires() {
        let mut shutdown = Shutdown::never();

        assert!(!shutdown.is_triggered());
        assert!(!shutdown.sleep(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_subscribers_see_trigger() {
        let (trigger, first) = shutdown_channel();
        let mut second = trigger.subscribe();

        trigger.trigger();

        assert!(first.is_triggered());
        second.triggered().await;
    }
}
