//! Cooperative cancellation shared by the runner, triage and the Ctrl-C
//! handler.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Clonable cancellation flag.
///
/// Cancellation is only observed between items and while pacing, so an
/// in-flight provider call always completes before the run stops.
#[derive(Debug, Clone)]
pub struct Cancellation {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancellation {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as `self`, so the channel cannot close here.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// Returns `true` when the wait ended because of cancellation.
    pub async fn pause(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return self.is_cancelled();
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.is_cancelled(),
            _ = self.cancelled() => true,
        }
    }

    /// Cancel this flag on SIGINT / Ctrl-C.
    pub fn install_ctrlc_handler(&self) -> Result<(), ctrlc::Error> {
        let cancellation = self.clone();
        ctrlc::set_handler(move || {
            if cancellation.is_cancelled() {
                // Second Ctrl-C: give up on the graceful flush.
                std::process::exit(130);
            }
            cancellation.cancel();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pause_completes_when_not_cancelled() {
        let cancellation = Cancellation::new();
        assert!(!cancellation.pause(Duration::from_millis(5)).await);
    }

    #[tokio::test]
    async fn test_pause_returns_early_on_cancel() {
        let cancellation = Cancellation::new();
        let trigger = cancellation.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        assert!(cancellation.pause(Duration::from_secs(30)).await);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_zero_pause_reports_existing_cancellation() {
        let cancellation = Cancellation::new();
        assert!(!cancellation.pause(Duration::ZERO).await);
        cancellation.cancel();
        assert!(cancellation.pause(Duration::ZERO).await);
        assert!(cancellation.is_cancelled());
    }
}
