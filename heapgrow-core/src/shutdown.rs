use std::sync::Arc;
use tokio::sync::watch;

/// Run-wide cancellation signal
///
/// Clones share one flag: any holder may trigger it and every holder
/// observes it. Once triggered it stays triggered.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once [`Shutdown::trigger`] has been called by any clone
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        // `self` keeps the sender alive, so this cannot fail.
        let _ = rx.wait_for(|stop| *stop).await;
    }

    /// Sleep for `dur`, returning `false` early if shutdown fires first
    pub async fn sleep(&self, dur: std::time::Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(dur) => true,
            _ = self.triggered() => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn clones_observe_trigger() {
        let shutdown = Shutdown::new();
        let waiter = shutdown.clone();
        let handle = tokio::spawn(async move {
            waiter.triggered().await;
            waiter.is_triggered()
        });
        assert!(!shutdown.is_triggered());
        shutdown.trigger();
        assert!(handle.await.unwrap());
    }

    #[tokio::test]
    async fn late_waiters_return_immediately() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        tokio::time::timeout(Duration::from_millis(100), shutdown.triggered())
            .await
            .expect("already-triggered shutdown must not block");
        assert!(!shutdown.sleep(Duration::from_secs(10)).await);
    }
}
