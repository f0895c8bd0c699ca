//! Cancellation for long-running reads.
//!
//! A tailing read never ends on its own. The caller keeps a
//! [`ShutdownHandle`] clone and triggers it (typically from Ctrl+C); the
//! polling loop races every fetch and every sleep against
//! [`ShutdownHandle::cancelled`], so the signal is seen promptly rather than
//! only between iterations.
//!
//! ```ignore
//! let shutdown = ShutdownHandle::new();
//! shutdown.cancel_on_ctrl_c();
//! poller.run(&mut handle, &shutdown, |event| render(event)).await?;
//! ```

use tokio::sync::watch;

/// Why a read was asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// Received SIGINT (Ctrl+C)
    Interrupt,
    /// Requested by code
    Manual,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Interrupt => write!(f, "interrupt (Ctrl+C)"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// Handle for triggering and observing cancellation.
#[derive(Clone)]
pub struct ShutdownHandle {
    sender: watch::Sender<Option<ShutdownSignal>>,
    receiver: watch::Receiver<Option<ShutdownSignal>>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(None);
        Self { sender, receiver }
    }

    /// Trigger a manual cancellation.
    pub fn cancel(&self) {
        self.signal(ShutdownSignal::Manual);
    }

    fn signal(&self, signal: ShutdownSignal) {
        // Only the first signal counts.
        self.sender.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(signal);
                true
            } else {
                false
            }
        });
    }

    /// Resolve once cancellation has been requested.
    pub async fn cancelled(&self) -> ShutdownSignal {
        let mut receiver = self.receiver.clone();
        loop {
            if let Some(signal) = *receiver.borrow_and_update() {
                return signal;
            }
            if receiver.changed().await.is_err() {
                // All senders gone; nobody can cancel any more.
                std::future::pending::<()>().await;
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.receiver.borrow().is_some()
    }

    /// Spawn a task that cancels this handle on the first Ctrl+C.
    ///
    /// Must be called from within a tokio runtime.
    pub fn cancel_on_ctrl_c(&self) -> tokio::task::JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                handle.signal(ShutdownSignal::Interrupt);
            }
        })
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_wakes_waiter() {
        let shutdown = ShutdownHandle::new();
        assert!(!shutdown.is_cancelled());

        let waiter = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { shutdown.cancelled().await })
        };

        tokio::time::sleep(Duration::from_millis(5)).await;
        shutdown.cancel();

        assert_eq!(waiter.await.unwrap(), ShutdownSignal::Manual);
        assert!(shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_immediately_after_cancel() {
        let shutdown = ShutdownHandle::new();
        shutdown.cancel();
        shutdown.cancel();
        assert_eq!(shutdown.cancelled().await, ShutdownSignal::Manual);
    }

    #[test]
    fn test_signal_display() {
        assert_eq!(ShutdownSignal::Interrupt.to_string(), "interrupt (Ctrl+C)");
        assert_eq!(ShutdownSignal::Manual.to_string(), "manual");
    }
}
